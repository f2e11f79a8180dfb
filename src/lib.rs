//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a minimal 8-bit computer with 256 bytes of
//! memory, eight byte registers and a downward-growing stack.
//!
//! ```
//! use ls8::{Cpu, Opcode};
//!
//! let mut cpu = Cpu::new();
//! cpu.load_program(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]).unwrap();
//! cpu.run().unwrap();
//! assert_eq!(cpu.take_output(), vec![8]);
//! ```

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuConfig, CpuState, CpuError, Memory, Registers, Instruction, Opcode, AluOp};
pub use asm::{assemble, disassemble, AssemblerError, Ls8File, LoadError, load_ls8, save_ls8};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
