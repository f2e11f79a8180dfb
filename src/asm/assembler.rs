//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (`#` works too)
//! MAIN:               ; Define a label
//!     LDI R0,8        ; Load immediate
//!     LDI R1,SUB      ; Labels can be used as immediates
//!     CALL R1
//!     PRN R0
//!     HLT
//!
//!     ORG 0x20        ; Move the origin forward
//! SUB:
//!     MUL R0,R0
//!     RET
//!     DB 42           ; Define a data byte
//! ```

use crate::cpu::decode::{encode, Instruction, Opcode};
use crate::cpu::memory::MEMORY_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An immediate that may still be waiting on a label.
enum Value {
    Known(u8),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Pending references: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output image.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find([';', '#']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", &line[..colon_idx]),
                });
            }
            if self.symbols.insert(label.clone(), self.output.len()).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("duplicate label '{}'", label),
                });
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m, r.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let [operand] = expect_operands::<1>(&mnemonic, &operands, line_num)?;
                let addr = parse_number(operand, line_num)?;
                if addr < self.output.len() || addr >= MEMORY_SIZE {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr as i64 });
                }
                self.output.resize(addr, 0);
            }

            "DB" | "DATA" => {
                if operands.is_empty() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "DB requires at least one value".into(),
                    });
                }
                for operand in operands {
                    let value = parse_immediate(operand, line_num)?;
                    self.emit_value(value, line_num);
                }
            }

            // Instructions
            _ => self.process_opcode(&mnemonic, &operands, line_num)?,
        }

        if self.output.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }

        Ok(())
    }

    fn process_opcode(&mut self, mnemonic: &str, operands: &[&str], line_num: usize)
        -> Result<(), AssemblerError>
    {
        // LDI is the only instruction whose operand may be a forward reference.
        if mnemonic == "LDI" {
            let [reg, imm] = expect_operands::<2>(mnemonic, operands, line_num)?;
            let reg = parse_register(reg, line_num)?;
            let value = parse_immediate(imm, line_num)?;
            self.output.extend([Opcode::LDI, reg]);
            self.emit_value(value, line_num);
            return Ok(());
        }

        let instr = match mnemonic {
            "HLT" | "HALT" => {
                expect_operands::<0>(mnemonic, operands, line_num)?;
                Instruction::Hlt
            }
            "RET" => {
                expect_operands::<0>(mnemonic, operands, line_num)?;
                Instruction::Ret
            }
            "PRN" | "PUSH" | "POP" | "CALL" => {
                let [reg] = expect_operands::<1>(mnemonic, operands, line_num)?;
                let reg = parse_register(reg, line_num)?;
                match mnemonic {
                    "PRN" => Instruction::Prn { reg },
                    "PUSH" => Instruction::Push { reg },
                    "POP" => Instruction::Pop { reg },
                    _ => Instruction::Call { reg },
                }
            }
            "ADD" | "MUL" => {
                let [a, b] = expect_operands::<2>(mnemonic, operands, line_num)?;
                let a = parse_register(a, line_num)?;
                let b = parse_register(b, line_num)?;
                if mnemonic == "ADD" {
                    Instruction::Add { a, b }
                } else {
                    Instruction::Mul { a, b }
                }
            }
            _ => return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.to_string(),
            }),
        };

        self.output.extend(encode(&instr));
        Ok(())
    }

    fn emit_value(&mut self, value: Value, line_num: usize) {
        match value {
            Value::Known(byte) => self.output.push(byte),
            Value::Label(label) => {
                self.pending.push((self.output.len(), label, line_num));
                self.output.push(0);
            }
        }
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;

            self.output[*out_idx] = u8::try_from(*addr).map_err(|_| AssemblerError::ValueOutOfRange {
                line: *line_num,
                value: *addr as i64,
            })?;
        }
        Ok(())
    }
}

/// Check the operand count, handing the operands back as an array.
fn expect_operands<'a, const N: usize>(mnemonic: &str, operands: &[&'a str], line_num: usize)
    -> Result<[&'a str; N], AssemblerError>
{
    <[&str; N]>::try_from(operands).map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("{} takes {} operand(s), found {}", mnemonic, N, operands.len()),
    })
}

/// Parse a byte immediate: a number or a label.
fn parse_immediate(operand: &str, line_num: usize) -> Result<Value, AssemblerError> {
    let starts_numeric = operand.chars().next().map_or(false, |c| c.is_ascii_digit());
    if starts_numeric {
        let value = parse_number(operand, line_num)?;
        let byte = u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
            line: line_num,
            value: value as i64,
        })?;
        return Ok(Value::Known(byte));
    }

    // Must be a label reference - resolved in pass 2
    Ok(Value::Label(operand.to_uppercase()))
}

/// Parse `R0`-`R7`.
fn parse_register(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let index = operand
        .strip_prefix(['R', 'r'])
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|&index| index < 8);

    index.ok_or_else(|| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("expected register R0-R7, found '{}'", operand),
    })
}

/// Parse a decimal, `0x` hex or `0b` binary number.
fn parse_number(operand: &str, line_num: usize) -> Result<usize, AssemblerError> {
    let parsed = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
    } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
        usize::from_str_radix(bin, 2)
    } else {
        operand.parse::<usize>()
    };

    parsed.map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number '{}'", operand),
    })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program exceeds memory on line {line}")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDI R0,9
            LDI R1, 3
            MUL R0,R1
            PRN R0     # print 27
            HLT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![
            Opcode::LDI, 0, 9,
            Opcode::LDI, 1, 3,
            Opcode::MUL, 0, 1,
            Opcode::PRN, 0,
            Opcode::HLT,
        ]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        MAIN:
            LDI R1,SUB
            CALL R1
            HLT
        SUB: RET
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![Opcode::LDI, 1, 6, Opcode::CALL, 1, Opcode::HLT, Opcode::RET]);
    }

    #[test]
    fn test_assemble_org_and_data() {
        let source = r#"
            HLT
            ORG 0x04
        DATA: DB 42, 0b101, 0xFF
            LDI R2,data
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![Opcode::HLT, 0, 0, 0, 42, 5, 255, Opcode::LDI, 2, 4]);
    }

    #[test]
    fn test_assemble_errors() {
        assert!(matches!(
            assemble("JMP R0"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("LDI R8,1"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("\nLDI R0,256"),
            Err(AssemblerError::ValueOutOfRange { line: 2, value: 256 })
        ));
        assert!(matches!(
            assemble("LDI R0,NOWHERE"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("PRN R0,R1"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("A:\nA:"),
            Err(AssemblerError::SyntaxError { line: 2, .. })
        ));
    }

    #[test]
    fn test_assemble_too_large() {
        let source = "ORG 255\nLDI R0,1";
        assert!(matches!(
            assemble(source),
            Err(AssemblerError::ProgramTooLarge { line: 2 })
        ));
    }
}
