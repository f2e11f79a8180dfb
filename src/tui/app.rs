//! Debugger application state and logic.

use crate::{Cpu, CpuConfig};
use crate::asm::disasm::{format_instruction, listing};
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use std::collections::HashSet;

/// Bytes shown per row of the memory view.
pub const MEM_ROW_BYTES: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u8>,
    /// Everything the program has printed so far.
    pub output: Vec<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>, config: CpuConfig) -> Self {
        let mut app = Self {
            cpu: Cpu::with_config(config),
            program,
            breakpoints: HashSet::new(),
            output: Vec::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
        };
        app.status = match app.reload() {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            Err(e) => format!("Load error: {}", e),
        };
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        let result = self.cpu.step();
        self.output.extend(self.cpu.take_output());

        match result {
            Ok(instr) => {
                self.status = format!("PC={:02X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles", self.cpu.cycles);
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.status = match self.reload() {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Load error: {}", e),
        };
    }

    fn reload(&mut self) -> Result<(), MemoryError> {
        self.cpu.reset();
        self.output.clear();
        self.running = false;
        self.cpu.load_program(&self.program)
    }

    /// Scroll the memory view by `rows`, clamped to memory.
    pub fn scroll_memory(&mut self, rows: isize) {
        let max = MEMORY_SIZE / MEM_ROW_BYTES - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(rows).min(max);
    }

    /// Get disassembly starting at the current PC.
    ///
    /// Decoding from PC rather than from the top of memory keeps the
    /// view aligned after a CALL or RET lands mid-stream.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u8, String, bool)> {
        let pc = self.cpu.regs.pc as usize;
        let mem = self.cpu.mem.as_slice();

        listing(&mem[pc..], pc)
            .into_iter()
            .take(lines)
            .map(|line| (line.addr as u8, line.text, line.addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>, config: CpuConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program, config);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    fn app(program: &[u8]) -> DebuggerApp {
        DebuggerApp::new(program.to_vec(), CpuConfig::default())
    }

    #[test]
    fn test_step_collects_output() {
        let mut app = app(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]);

        app.step();
        app.step();
        assert_eq!(app.output, vec![8]);
        assert!(app.status.contains("PRN R0"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]);
        app.cpu.regs.pc = 3;
        app.toggle_breakpoint();
        app.cpu.regs.pc = 0;

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 3);
        assert!(app.output.is_empty());
    }

    #[test]
    fn test_reset_reloads_program() {
        let mut app = app(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]);
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(app.cpu.is_halted());

        app.reset();
        assert!(app.cpu.is_running());
        assert!(app.output.is_empty());
        assert_eq!(app.cpu.mem.read(0), Ok(Opcode::LDI));
    }

    #[test]
    fn test_disassembly_from_pc() {
        let app = app(&[Opcode::LDI, 0, 8, Opcode::PRN, 0, Opcode::HLT]);
        let rows = app.get_disassembly(3);

        assert_eq!(rows[0], (0, "LDI R0,8".to_string(), true));
        assert_eq!(rows[1], (3, "PRN R0".to_string(), false));
        assert_eq!(rows[2].1, "HLT");
    }

    #[test]
    fn test_scroll_clamps() {
        let mut app = app(&[Opcode::HLT]);
        app.scroll_memory(-5);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(1000);
        assert_eq!(app.mem_scroll, MEMORY_SIZE / MEM_ROW_BYTES - 1);
    }
}
