//! LS-8 CPU registers.
//!
//! The LS-8 has 8 general-purpose byte registers, R0-R7:
//! - R0-R6: free for program use
//! - R7: stack pointer (SP)
//!
//! The program counter is kept separately and is not addressable by
//! instructions.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the register reserved as the stack pointer.
pub const SP: u8 = 7;

/// Initial stack pointer: the stack grows down from just below the
/// reserved top-of-memory area (0xF4-0xFF).
pub const STACK_TOP: u8 = 0xF4;

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    reg: [u8; REGISTER_COUNT],
    /// PC: address of the next instruction to fetch
    pub pc: u8,
}

impl Registers {
    /// Create a register file with every register zeroed except SP.
    pub fn new(stack_top: u8) -> Self {
        let mut reg = [0; REGISTER_COUNT];
        reg[SP as usize] = stack_top;
        Self { reg, pc: 0 }
    }

    /// Read register `index`.
    #[inline]
    pub fn get(&self, index: u8) -> Result<u8, RegisterError> {
        self.reg
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::IndexOutOfRange(index))
    }

    /// Write register `index`.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let slot = self.reg
            .get_mut(index as usize)
            .ok_or(RegisterError::IndexOutOfRange(index))?;
        *slot = value;
        Ok(())
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.reg[SP as usize]
    }

    /// Set the stack pointer.
    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.reg[SP as usize] = value;
    }

    /// All register values, R0 first.
    pub fn values(&self) -> [u8; REGISTER_COUNT] {
        self.reg
    }

    /// Reset all registers, restoring SP to `stack_top`.
    pub fn reset(&mut self, stack_top: u8) {
        *self = Self::new(stack_top);
    }

    /// Advance the program counter by `width` bytes.
    ///
    /// Fails with the would-be address when it runs off the end of memory.
    pub fn advance_pc(&mut self, width: usize) -> Result<u8, usize> {
        let next = self.pc as usize + width;
        self.pc = u8::try_from(next).map_err(|_| next)?;
        Ok(self.pc)
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(STACK_TOP)
    }
}

/// Errors from register file access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("register index {0} out of range (R0-R7)")]
    IndexOutOfRange(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registers() {
        let regs = Registers::default();

        assert_eq!(regs.values(), [0, 0, 0, 0, 0, 0, 0, STACK_TOP]);
        assert_eq!(regs.sp(), 0xF4);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_register_bounds() {
        let mut regs = Registers::default();

        regs.set(3, 99).unwrap();
        assert_eq!(regs.get(3), Ok(99));

        assert_eq!(regs.get(8), Err(RegisterError::IndexOutOfRange(8)));
        assert_eq!(regs.set(255, 1), Err(RegisterError::IndexOutOfRange(255)));
        assert_eq!(
            regs.get(8).unwrap_err().to_string(),
            "register index 8 out of range (R0-R7)"
        );
    }

    #[test]
    fn test_sp_is_r7() {
        let mut regs = Registers::default();
        regs.set(SP, 0x80).unwrap();
        assert_eq!(regs.sp(), 0x80);

        regs.set_sp(0x10);
        assert_eq!(regs.get(7), Ok(0x10));
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::default();
        regs.pc = 10;

        assert_eq!(regs.advance_pc(3), Ok(13));
        assert_eq!(regs.pc, 13);

        regs.pc = 254;
        assert_eq!(regs.advance_pc(1), Ok(255));
        assert_eq!(regs.advance_pc(2), Err(257));
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::default();
        regs.set(0, 1).unwrap();
        regs.pc = 40;

        regs.reset(0x20);
        assert_eq!(regs.values(), [0, 0, 0, 0, 0, 0, 0, 0x20]);
        assert_eq!(regs.pc, 0);
    }
}
