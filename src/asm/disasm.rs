//! Disassembler for LS-8 programs.
//!
//! Converts raw program bytes back to readable assembly.

use crate::cpu::decode::{decode, Instruction};

/// One decoded line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    /// Address of the first byte.
    pub addr: usize,
    /// Assembly text, or `???` for bytes that are not a valid instruction.
    pub text: String,
    /// The bytes this line covers.
    pub bytes: Vec<u8>,
}

/// Disassemble the instruction at the start of `bytes`.
pub fn disassemble_instruction(bytes: &[u8]) -> String {
    match decode(bytes) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => match bytes.first() {
            Some(byte) => format!("??? ; {:#04x}", byte),
            None => "???".to_string(),
        },
    }
}

/// Walk `program` instruction by instruction, starting at `origin`.
///
/// Bytes that do not decode are emitted one at a time as `???` so the walk
/// resynchronises on the next byte.
pub fn listing(program: &[u8], origin: usize) -> Vec<ListingLine> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < program.len() {
        let rest = &program[offset..];
        let (text, width) = match decode(rest) {
            Ok(instr) => (format_instruction(&instr), instr.width()),
            Err(_) => ("???".to_string(), 1),
        };

        lines.push(ListingLine {
            addr: origin + offset,
            text,
            bytes: rest[..width].to_vec(),
        });
        offset += width;
    }

    lines
}

/// Disassemble a whole program into a printable listing.
pub fn disassemble(program: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; -----------------\n\n");

    for line in listing(program, 0) {
        let hex: Vec<String> = line.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        output.push_str(&format!("{:02X}: {:<12} ; {}\n", line.addr, line.text, hex.join(" ")));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg } => format!("{} R{}", instr.mnemonic(), reg),
        Instruction::Add { a, b } | Instruction::Mul { a, b } => {
            format!("{} R{},R{}", instr.mnemonic(), a, b)
        }
        Instruction::Ret | Instruction::Hlt => instr.mnemonic().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::Opcode;

    #[test]
    fn test_disassemble_hlt() {
        assert_eq!(disassemble_instruction(&[Opcode::HLT]), "HLT");
    }

    #[test]
    fn test_disassemble_operands() {
        assert_eq!(disassemble_instruction(&[Opcode::LDI, 0, 8]), "LDI R0,8");
        assert_eq!(disassemble_instruction(&[Opcode::MUL, 0, 1]), "MUL R0,R1");
        assert_eq!(disassemble_instruction(&[Opcode::CALL, 3]), "CALL R3");
    }

    #[test]
    fn test_disassemble_invalid() {
        assert_eq!(disassemble_instruction(&[0xFF]), "??? ; 0xff");
        assert_eq!(disassemble_instruction(&[]), "???");
    }

    #[test]
    fn test_listing_resynchronises() {
        let program = [Opcode::LDI, 0, 8, 0x00, Opcode::PRN, 0, Opcode::HLT];
        let lines = listing(&program, 0);

        let addrs: Vec<usize> = lines.iter().map(|l| l.addr).collect();
        assert_eq!(addrs, vec![0, 3, 4, 6]);
        assert_eq!(lines[1].text, "???");
        assert_eq!(lines[2].bytes, vec![Opcode::PRN, 0]);
    }

    #[test]
    fn test_listing_truncated_tail() {
        // LDI with only one operand byte left decodes as raw bytes
        let lines = listing(&[Opcode::LDI, 0], 0x10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].addr, 0x10);
        assert_eq!(lines[0].text, "???");
    }

    #[test]
    fn test_disassemble_program() {
        let text = disassemble(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]);
        assert!(text.contains("00: LDI R0,8"));
        assert!(text.contains("03: PRN R0"));
        assert!(text.contains("05: HLT"));
        assert!(text.contains("82 00 08"));
    }
}
