//! LS-8 memory subsystem.
//!
//! A flat array of 256 bytes, addressed 0x00-0xFF. Program code, data and
//! the stack all share this space.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory cells in the LS-8.
pub const MEMORY_SIZE: usize = 256;

/// LS-8 memory: 256 byte cells.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the byte at `addr` (the MAR). Fails if `addr` is past the end of RAM.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Store `value` (the MDR) at `addr`.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), MemoryError> {
        let cell = self.cells
            .get_mut(addr)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;
        *cell = value;
        Ok(())
    }

    /// Non-failing read for views that render past the end of RAM.
    #[inline]
    pub fn get(&self, addr: usize) -> Option<u8> {
        self.cells.get(addr).copied()
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Load a program into memory starting at the given address.
    pub fn load_program(&mut self, start_addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        if program.is_empty() {
            return Err(MemoryError::EmptyProgram);
        }

        let available = MEMORY_SIZE.saturating_sub(start_addr);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let start = start.min(MEMORY_SIZE);
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }

    /// The raw contents of memory.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {0} out of range (0 to {max})", max = MEMORY_SIZE - 1)]
    AddressOutOfRange(usize),
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
    /// Nothing to load.
    #[error("program contains no instructions")]
    EmptyProgram,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new();

        assert!(mem.read(0).is_ok());
        assert!(mem.read(255).is_ok());

        assert_eq!(mem.read(256), Err(MemoryError::AddressOutOfRange(256)));
        assert_eq!(mem.write(300, 1), Err(MemoryError::AddressOutOfRange(300)));
        assert_eq!(mem.get(256), None);
    }

    #[test]
    fn test_memory_error_messages() {
        assert_eq!(
            MemoryError::AddressOutOfRange(256).to_string(),
            "memory address 256 out of range (0 to 255)"
        );
        assert_eq!(
            MemoryError::ProgramTooLarge { size: 300, available: 256 }.to_string(),
            "program size 300 exceeds available space 256"
        );
        assert_eq!(MemoryError::EmptyProgram.to_string(), "program contains no instructions");
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();

        mem.load_program(0, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0).unwrap(), 1);
        assert_eq!(mem.read(1).unwrap(), 2);
        assert_eq!(mem.read(2).unwrap(), 3);
    }

    #[test]
    fn test_load_program_at_origin_overwrites() {
        let mut mem = Memory::new();
        mem.load_program(0, &[9; 8]).unwrap();
        mem.load_program(4, &[1, 2]).unwrap();

        assert_eq!(&mem.as_slice()[..8], &[9, 9, 9, 9, 1, 2, 9, 9]);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();

        assert!(mem.load_program(0, &[0; MEMORY_SIZE]).is_ok());
        assert_eq!(
            mem.load_program(250, &[0; 7]),
            Err(MemoryError::ProgramTooLarge { size: 7, available: 6 })
        );
        assert_eq!(
            mem.load_program(300, &[0]),
            Err(MemoryError::ProgramTooLarge { size: 1, available: 0 })
        );
    }

    #[test]
    fn test_load_empty_program() {
        let mut mem = Memory::new();
        assert_eq!(mem.load_program(0, &[]), Err(MemoryError::EmptyProgram));
    }

    #[test]
    fn test_dump_clamps_to_memory() {
        let mem = Memory::new();
        let cells = mem.dump(250, 20);

        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], (250, 0));
        assert_eq!(cells[5], (255, 0));
        assert!(mem.dump(400, 4).is_empty());
    }
}
