//! Instruction decoder for the LS-8.
//!
//! Every instruction is one opcode byte followed by up to two operand bytes.
//! The opcode layout is `AABCDDDD`:
//! - `AA`: number of operands (0-2)
//! - `B`: 1 if the instruction is handled by the ALU
//! - `C`: 1 if the instruction sets the PC itself
//! - `DDDD`: instruction identifier

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Decoded LS-8 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Data Transfer ====================

    /// Load immediate: R[reg] := value
    Ldi { reg: u8, value: u8 },

    /// Print the decimal value of R[reg]
    Prn { reg: u8 },

    // ==================== Arithmetic ====================

    /// R[a] := R[a] + R[b] (mod 256)
    Add { a: u8, b: u8 },

    /// R[a] := R[a] * R[b] (mod 256)
    Mul { a: u8, b: u8 },

    // ==================== Stack ====================

    /// SP -= 1; [SP] := R[reg]
    Push { reg: u8 },

    /// R[reg] := [SP]; SP += 1
    Pop { reg: u8 },

    // ==================== Control Flow ====================

    /// Push the return address, then PC := R[reg]
    Call { reg: u8 },

    /// Pop the return address into PC
    Ret,

    /// Halt execution
    Hlt,
}

/// Opcode byte values.
#[derive(Debug, Clone, Copy)]
pub struct Opcode;

impl Opcode {
    pub const HLT: u8 = 0b0000_0001;
    pub const LDI: u8 = 0b1000_0010;
    pub const PRN: u8 = 0b0100_0111;
    pub const ADD: u8 = 0b1010_0000;
    pub const MUL: u8 = 0b1010_0010;
    pub const PUSH: u8 = 0b0100_0101;
    pub const POP: u8 = 0b0100_0110;
    pub const CALL: u8 = 0b0101_0000;
    pub const RET: u8 = 0b0001_0001;

    /// Every opcode this machine executes.
    pub const ALL: [u8; 9] = [
        Self::HLT,
        Self::LDI,
        Self::PRN,
        Self::ADD,
        Self::MUL,
        Self::PUSH,
        Self::POP,
        Self::CALL,
        Self::RET,
    ];

    /// Number of operand bytes declared by the top two bits of `opcode`.
    #[inline]
    pub const fn operand_count(opcode: u8) -> usize {
        (opcode >> 6) as usize
    }

    /// Whether `opcode` is one this machine knows.
    pub fn is_known(opcode: u8) -> bool {
        Self::ALL.contains(&opcode)
    }
}

/// Width in bytes of the instruction starting with `opcode`.
pub fn width(opcode: u8) -> Result<usize, DecodeError> {
    if !Opcode::is_known(opcode) {
        return Err(DecodeError::InvalidOpcode(opcode));
    }
    Ok(1 + Opcode::operand_count(opcode))
}

/// Decode one instruction from `bytes`.
///
/// `bytes[0]` is the opcode; the operand bytes it declares must follow.
/// Trailing bytes are ignored.
pub fn decode(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let (&opcode, operands) = bytes.split_first().ok_or(DecodeError::Truncated {
        opcode: None,
        expected: 1,
        found: 0,
    })?;

    let expected = width(opcode)?;
    if bytes.len() < expected {
        return Err(DecodeError::Truncated {
            opcode: Some(opcode),
            expected,
            found: bytes.len(),
        });
    }

    let a = operands.first().copied().unwrap_or(0);
    let b = operands.get(1).copied().unwrap_or(0);

    let instruction = match opcode {
        Opcode::HLT => Instruction::Hlt,
        Opcode::LDI => Instruction::Ldi { reg: a, value: b },
        Opcode::PRN => Instruction::Prn { reg: a },
        Opcode::ADD => Instruction::Add { a, b },
        Opcode::MUL => Instruction::Mul { a, b },
        Opcode::PUSH => Instruction::Push { reg: a },
        Opcode::POP => Instruction::Pop { reg: a },
        Opcode::CALL => Instruction::Call { reg: a },
        Opcode::RET => Instruction::Ret,
        _ => return Err(DecodeError::InvalidOpcode(opcode)),
    };

    Ok(instruction)
}

/// Encode an instruction back to its bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut bytes = vec![instr.opcode()];
    match *instr {
        Instruction::Ldi { reg, value } => bytes.extend([reg, value]),
        Instruction::Add { a, b } | Instruction::Mul { a, b } => bytes.extend([a, b]),
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg } => bytes.push(reg),
        Instruction::Ret | Instruction::Hlt => {}
    }
    bytes
}

impl Instruction {
    /// The opcode byte of this instruction.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Hlt => Opcode::HLT,
            Instruction::Ldi { .. } => Opcode::LDI,
            Instruction::Prn { .. } => Opcode::PRN,
            Instruction::Add { .. } => Opcode::ADD,
            Instruction::Mul { .. } => Opcode::MUL,
            Instruction::Push { .. } => Opcode::PUSH,
            Instruction::Pop { .. } => Opcode::POP,
            Instruction::Call { .. } => Opcode::CALL,
            Instruction::Ret => Opcode::RET,
        }
    }

    /// Size of the instruction in memory, including operands.
    pub fn width(&self) -> usize {
        1 + Opcode::operand_count(self.opcode())
    }

    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Hlt => "HLT",
            Instruction::Ldi { .. } => "LDI",
            Instruction::Prn { .. } => "PRN",
            Instruction::Add { .. } => "ADD",
            Instruction::Mul { .. } => "MUL",
            Instruction::Push { .. } => "PUSH",
            Instruction::Pop { .. } => "POP",
            Instruction::Call { .. } => "CALL",
            Instruction::Ret => "RET",
        }
    }

    /// Whether executing this instruction sets the PC directly.
    pub fn sets_pc(&self) -> bool {
        self.opcode() & 0b0001_0000 != 0
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#010b}")]
    InvalidOpcode(u8),

    #[error("truncated instruction: expected {expected} bytes, found {found}")]
    Truncated { opcode: Option<u8>, expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hlt() {
        assert_eq!(decode(&[0b0000_0001]).unwrap(), Instruction::Hlt);
    }

    #[test]
    fn test_decode_ldi() {
        let instr = decode(&[Opcode::LDI, 0, 8]).unwrap();
        assert_eq!(instr, Instruction::Ldi { reg: 0, value: 8 });
        assert_eq!(instr.width(), 3);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let instr = decode(&[Opcode::PRN, 2, 0xFF]).unwrap();
        assert_eq!(instr, Instruction::Prn { reg: 2 });
    }

    #[test]
    fn test_decode_invalid_opcode() {
        assert_eq!(decode(&[0]), Err(DecodeError::InvalidOpcode(0)));
        assert_eq!(decode(&[0xFF, 1, 2]), Err(DecodeError::InvalidOpcode(0xFF)));
        assert_eq!(width(0b1010_0001), Err(DecodeError::InvalidOpcode(0b1010_0001)));
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(
            decode(&[Opcode::MUL, 0]),
            Err(DecodeError::Truncated { opcode: Some(Opcode::MUL), expected: 3, found: 2 })
        );
        assert!(matches!(decode(&[]), Err(DecodeError::Truncated { opcode: None, .. })));
    }

    #[test]
    fn test_operand_count_matches_width() {
        let widths: Vec<usize> = Opcode::ALL.iter().map(|&op| width(op).unwrap()).collect();
        assert_eq!(widths, vec![1, 3, 2, 3, 3, 2, 2, 2, 1]);
    }

    #[test]
    fn test_sets_pc() {
        assert!(Instruction::Call { reg: 1 }.sets_pc());
        assert!(Instruction::Ret.sets_pc());
        assert!(!Instruction::Push { reg: 1 }.sets_pc());
        assert!(!Instruction::Add { a: 0, b: 1 }.sets_pc());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let test_cases = [
            Instruction::Hlt,
            Instruction::Ret,
            Instruction::Ldi { reg: 3, value: 200 },
            Instruction::Mul { a: 0, b: 1 },
            Instruction::Call { reg: 6 },
        ];

        for instr in test_cases {
            let encoded = encode(&instr);
            assert_eq!(encoded.len(), instr.width());
            assert_eq!(decode(&encoded).unwrap(), instr);
        }
    }
}
