//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{AluError, AluOp};
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{RegisterError, STACK_TOP};
use log::{debug, trace};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU encountered an error.
    Error,
}

/// Machine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuConfig {
    /// Address programs are loaded at.
    pub origin: u8,
    /// Initial value of the stack pointer (R7).
    pub stack_top: u8,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            origin: 0,
            stack_top: STACK_TOP,
        }
    }
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Values printed by PRN and not yet taken.
    output: Vec<u8>,
    config: CpuConfig,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    /// Create a new CPU with the given configuration.
    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            regs: Registers::new(config.stack_top),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            output: Vec::new(),
            config,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset(self.config.stack_top);
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.output.clear();
        self.last_instr = None;
    }

    /// The configuration this CPU was built with.
    pub fn config(&self) -> CpuConfig {
        self.config
    }

    /// Load a program into memory at the configured origin.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.load(program, self.config.origin)
    }

    /// Load a program into memory at `origin`. Registers and PC are untouched.
    pub fn load(&mut self, program: &[u8], origin: u8) -> Result<(), MemoryError> {
        self.mem.load_program(origin as usize, program)?;
        debug!("loaded {} bytes at {:#04x}", program.len(), origin);
        Ok(())
    }

    /// Read a byte of memory.
    #[inline]
    pub fn ram_read(&self, addr: usize) -> Result<u8, CpuError> {
        Ok(self.mem.read(addr)?)
    }

    /// Write a byte of memory.
    #[inline]
    pub fn ram_write(&mut self, value: u8, addr: usize) -> Result<(), CpuError> {
        Ok(self.mem.write(addr, value)?)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Any error
    /// leaves the CPU in [`CpuState::Error`].
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.fetch_decode().and_then(|instr| self.execute(instr).map(|_| instr)) {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        debug!("halted after {} cycles", self.cycles - start_cycles);
        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Fetch the instruction at PC and decode it.
    ///
    /// Only the operand bytes the opcode declares are read, each one
    /// bounds-checked.
    fn fetch_decode(&self) -> Result<Instruction, CpuError> {
        let pc = self.regs.pc;
        let ir = self.ram_read(pc as usize)?;

        let width = decode::width(ir).map_err(|_| CpuError::UnknownOpcode {
            opcode: ir,
            address: pc,
        })?;

        let mut raw = [ir, 0, 0];
        for (offset, slot) in raw.iter_mut().enumerate().take(width).skip(1) {
            *slot = self.ram_read(pc as usize + offset)?;
        }

        let instr = decode::decode(&raw[..width])?;
        trace!("{:#04x}: {:?}", pc, instr);
        Ok(instr)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== Data Transfer ====================

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value)?;
            }

            Instruction::Prn { reg } => {
                let value = self.regs.get(reg)?;
                self.output.push(value);
            }

            // ==================== Arithmetic ====================

            Instruction::Add { a, b } | Instruction::Mul { a, b } => {
                let op = AluOp::try_from(instr.opcode())?;
                self.alu(op, a, b)?;
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.get(reg)?;
                self.push(value)?;
            }

            Instruction::Pop { reg } => {
                let value = self.ram_read(self.regs.sp() as usize)?;
                // R7 may be the destination; the increment applies to the popped value.
                self.regs.set(reg, value)?;
                self.increment_sp()?;
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                let return_addr = self.next_pc(instr.width())?;
                self.push(return_addr)?;
                // Read after the push so `CALL R7` jumps to the decremented SP.
                let target = self.regs.get(reg)?;
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let return_addr = self.pop()?;
                self.regs.jump(return_addr);
            }

            Instruction::Hlt => {
                self.state = CpuState::Halted;
            }
        }

        if !instr.sets_pc() && self.state == CpuState::Running {
            self.regs.advance_pc(instr.width()).map_err(out_of_range)?;
        }

        Ok(())
    }

    /// `R[a] := R[a] op R[b]`.
    pub fn alu(&mut self, op: AluOp, a: u8, b: u8) -> Result<(), CpuError> {
        let lhs = self.regs.get(a)?;
        let rhs = self.regs.get(b)?;
        self.regs.set(a, op.apply(lhs, rhs))?;
        Ok(())
    }

    /// Address of the instruction following the current one.
    fn next_pc(&self, width: usize) -> Result<u8, CpuError> {
        let next = self.regs.pc as usize + width;
        u8::try_from(next).map_err(|_| out_of_range(next))
    }

    /// Decrement SP, then store `value` at [SP].
    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.sp().checked_sub(1).ok_or(CpuError::StackOverflow)?;
        self.regs.set_sp(sp);
        self.ram_write(value, sp as usize)
    }

    /// Load [SP], then increment SP.
    fn pop(&mut self) -> Result<u8, CpuError> {
        let value = self.ram_read(self.regs.sp() as usize)?;
        self.increment_sp()?;
        Ok(value)
    }

    fn increment_sp(&mut self) -> Result<(), CpuError> {
        let next = self.regs.sp().checked_add(1).ok_or(CpuError::StackUnderflow)?;
        self.regs.set_sp(next);
        Ok(())
    }

    /// Drain the values printed since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Format PC, the next three bytes of memory and all registers as a
    /// single hex line.
    pub fn trace(&self) -> String {
        let pc = self.regs.pc as usize;
        let cell = |addr: usize| match self.mem.get(addr) {
            Some(byte) => format!("{:02X}", byte),
            None => "--".to_string(),
        };

        let mut line = format!("TRACE: {:02X} | {} {} {} |", pc, cell(pc), cell(pc + 1), cell(pc + 2));
        for value in self.regs.values() {
            line.push_str(&format!(" {:02X}", value));
        }
        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

fn out_of_range(addr: usize) -> CpuError {
    CpuError::MemoryError(MemoryError::AddressOutOfRange(addr))
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown instruction {opcode} at address {address}")]
    UnknownOpcode { opcode: u8, address: u8 },

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("register error: {0}")]
    RegisterError(#[from] RegisterError),

    #[error("decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("ALU error: {0}")]
    AluError(#[from] AluError),

    #[error("stack overflow: push below address 0")]
    StackOverflow,

    #[error("stack underflow: pop past address 255")]
    StackUnderflow,
}
