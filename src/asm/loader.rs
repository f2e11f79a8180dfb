//! `.ls8` program file format.
//!
//! A plain-text format with one byte per line:
//! - Each byte is a binary literal of 1-8 `0`/`1` digits
//! - Anything after `#` is a comment
//! - Blank and comment-only lines are ignored

use crate::asm::disasm::listing;
use log::debug;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Longest binary literal that still fits in a byte.
const MAX_LITERAL_DIGITS: usize = 8;

/// A loaded `.ls8` program.
#[derive(Debug, Clone, Default)]
pub struct Ls8File {
    /// The program bytes, in load order.
    pub bytes: Vec<u8>,
    /// Source line number each byte came from.
    pub source_lines: Vec<usize>,
}

impl Ls8File {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, line: usize) {
        self.bytes.push(byte);
        self.source_lines.push(line);
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse one binary literal.
fn parse_literal(token: &str) -> Option<u8> {
    let valid = !token.is_empty()
        && token.len() <= MAX_LITERAL_DIGITS
        && token.bytes().all(|b| b == b'0' || b == b'1');
    if !valid {
        return None;
    }
    u8::from_str_radix(token, 2).ok()
}

/// Parse `.ls8` source text.
pub fn parse_ls8<R: BufRead>(reader: R) -> Result<Ls8File, LoadError> {
    let mut program = Ls8File::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| LoadError::IoError(e.to_string()))?;
        let token = line.split('#').next().unwrap_or("").trim();

        // Skip empty lines and comments
        if token.is_empty() {
            continue;
        }

        let byte = parse_literal(token).ok_or_else(|| LoadError::MalformedLiteral {
            line: line_num + 1,
            text: token.to_string(),
        })?;

        program.push(byte, line_num + 1);
    }

    Ok(program)
}

/// Parse `.ls8` source held in a string.
pub fn parse_ls8_str(source: &str) -> Result<Ls8File, LoadError> {
    parse_ls8(source.as_bytes())
}

/// Load an `.ls8` file from disk.
pub fn load_ls8<P: AsRef<Path>>(path: P) -> Result<Ls8File, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::FileNotFound(path.display().to_string()),
        _ => LoadError::IoError(e.to_string()),
    })?;

    let program = parse_ls8(BufReader::new(file))?;
    debug!("parsed {} bytes from {}", program.len(), path.display());
    Ok(program)
}

/// Write `bytes` in `.ls8` format, annotating each instruction with its
/// disassembly.
pub fn write_ls8<W: Write>(mut out: W, bytes: &[u8]) -> std::io::Result<()> {
    writeln!(out, "# LS-8 program")?;
    writeln!(out, "# {} bytes", bytes.len())?;
    writeln!(out)?;

    for line in listing(bytes, 0) {
        for (i, byte) in line.bytes.iter().enumerate() {
            if i == 0 {
                writeln!(out, "{:08b} # {:02X}: {}", byte, line.addr, line.text)?;
            } else {
                writeln!(out, "{:08b}", byte)?;
            }
        }
    }

    Ok(())
}

/// Save a program to disk in `.ls8` format.
pub fn save_ls8<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), LoadError> {
    let file = std::fs::File::create(path.as_ref())
        .map_err(|e| LoadError::IoError(e.to_string()))?;
    write_ls8(std::io::BufWriter::new(file), bytes)
        .map_err(|e| LoadError::IoError(e.to_string()))
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{0} not found")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid number '{text}' on line {line}")]
    MalformedLiteral { line: usize, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::Cpu;

    const PRINT8: &str = "\
# print8.ls8: print the number 8 on the screen

10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0
00000000
00000001 # HLT
";

    #[test]
    fn test_parse_print8() {
        let program = parse_ls8_str(PRINT8).unwrap();

        assert_eq!(program.bytes, vec![0b1000_0010, 0, 8, 0b0100_0111, 0, 1]);
        assert_eq!(program.source_lines[0], 3);
    }

    #[test]
    fn test_parse_short_literals_and_whitespace() {
        let program = parse_ls8_str("  1  \n\t101#five\n#only a comment\n\n").unwrap();
        assert_eq!(program.bytes, vec![1, 5]);
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_ls8_str("00000001\n1000001x # bad\n").unwrap_err();
        assert_eq!(
            err,
            LoadError::MalformedLiteral { line: 2, text: "1000001x".to_string() }
        );
    }

    #[test]
    fn test_parse_too_wide() {
        assert!(matches!(
            parse_ls8_str("100000000\n"),
            Err(LoadError::MalformedLiteral { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        let program = parse_ls8_str("# nothing here\n\n").unwrap();
        assert!(program.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("ls8-emu-definitely-missing.ls8");
        assert!(matches!(load_ls8(&path), Err(LoadError::FileNotFound(_))));
    }

    fn run_bundled(name: &str) -> Vec<u8> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("programs").join(name);
        let program = load_ls8(path).unwrap();

        let mut cpu = Cpu::new();
        cpu.load_program(&program.bytes).unwrap();
        cpu.run().unwrap();
        cpu.take_output()
    }

    #[test]
    fn test_bundled_programs() {
        assert_eq!(run_bundled("print8.ls8"), vec![8]);
        assert_eq!(run_bundled("mult.ls8"), vec![72]);
        assert_eq!(run_bundled("stack.ls8"), vec![2, 4, 1]);
        assert_eq!(run_bundled("call.ls8"), vec![20, 30, 36, 60]);
    }

    #[test]
    fn test_assembled_call_matches_ls8() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("programs");
        let source = std::fs::read_to_string(dir.join("call.asm")).unwrap();

        assert_eq!(assemble(&source).unwrap(), load_ls8(dir.join("call.ls8")).unwrap().bytes);
    }

    #[test]
    fn test_write_then_parse() {
        let bytes = [0b1000_0010, 0, 8, 0b0100_0111, 0, 1];
        let mut out = Vec::new();
        write_ls8(&mut out, &bytes).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("10000010 # 00: LDI R0,8"));
        assert!(text.contains("00000001 # 05: HLT"));
        assert_eq!(parse_ls8_str(&text).unwrap().bytes, bytes.to_vec());
    }
}
