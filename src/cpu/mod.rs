//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 bytes of memory
//! - 8 general-purpose registers, R7 doubling as the stack pointer
//! - A variable-width instruction set: data movement, arithmetic,
//!   stack and subroutine call/return

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, RegisterError};
pub use decode::{Instruction, Opcode, DecodeError};
pub use alu::{AluOp, AluError};
pub use execute::{Cpu, CpuConfig, CpuError, CpuState};
