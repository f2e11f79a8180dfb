//! Program loading, assembly and disassembly for the LS-8.
//!
//! This module provides:
//! - The `.ls8` text format loader and writer
//! - A simple two-pass assembler (mnemonics → program bytes)
//! - A disassembler (program bytes → readable text)

pub mod assembler;
pub mod disasm;
pub mod loader;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use loader::{Ls8File, LoadError, load_ls8, parse_ls8_str, save_ls8};
