//! LS-8 Emulator - CLI Entry Point
//!
//! Usage: `ls8-emu <program>` runs an `.ls8` (or `.asm`) program until it
//! halts. PRN output goes to stdout, one value per line; diagnostics and
//! logs go to stderr.
//!
//! Exit codes:
//! - 0: program halted normally
//! - 1: wrong command-line arguments
//! - 2: program file not found
//! - 3: program could not be parsed, assembled or loaded
//! - 4: the machine faulted while running
//! - 5: writing an output file or running the debugger failed

use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use ls8::{Cpu, CpuConfig, CpuError, AssemblerError, LoadError};
use ls8::cpu::MemoryError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the LS-8 8-bit computer")]
struct Cli {
    /// Path to the .ls8 or .asm file to execute
    program: PathBuf,
    /// Print a trace line to stderr before every instruction
    #[arg(short, long)]
    trace: bool,
    /// Stop after this many instructions
    #[arg(short, long)]
    max_cycles: Option<u64>,
    /// Address to load the program at and start executing from
    #[arg(long, default_value = "0", value_parser = parse_byte)]
    origin: u8,
    /// Initial stack pointer
    #[arg(long, default_value = "0xF4", value_parser = parse_byte)]
    stack_top: u8,
    /// Print a disassembly listing instead of running
    #[arg(short, long)]
    disasm: bool,
    /// Write the loaded program to PATH in .ls8 format
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,
    /// Write the final machine state to PATH as JSON
    #[arg(long, value_name = "PATH")]
    state_json: Option<PathBuf>,
    /// Open the interactive debugger
    #[arg(long)]
    debug: bool,
}

/// Everything that can end a run early.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("assembly error: {0}")]
    Assemble(#[from] AssemblerError),

    #[error("failed to load program: {0}")]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error("failed to write {path}: {message}")]
    Output { path: PathBuf, message: String },

    #[error("debugger error: {0}")]
    Debugger(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Load(LoadError::FileNotFound(_)) => 2,
            CliError::Load(_) | CliError::Assemble(_) | CliError::Memory(_) => 3,
            CliError::Cpu(_) => 4,
            CliError::Output { .. } | CliError::Debugger(_) => 5,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("ls8-emu: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let program = read_program(&cli.program)?;

    if let Some(path) = &cli.emit {
        ls8::save_ls8(path, &program).map_err(|e| CliError::Output {
            path: path.clone(),
            message: e.to_string(),
        })?;
        info!("wrote {} bytes to {}", program.len(), path.display());
    }

    if cli.disasm {
        print!("{}", ls8::disassemble(&program));
        return Ok(());
    }

    let config = CpuConfig {
        origin: cli.origin,
        stack_top: cli.stack_top,
    };

    if cli.debug {
        return debug_program(program, config);
    }

    let mut cpu = Cpu::with_config(config);
    match cpu.load_program(&program) {
        Err(MemoryError::EmptyProgram) => warn!("{} contains no instructions", cli.program.display()),
        other => other?,
    }
    cpu.regs.jump(config.origin);

    info!("running {}", cli.program.display());
    let result = execute(&mut cpu, cli.max_cycles, cli.trace);

    if let Some(path) = &cli.state_json {
        write_state(&cpu, path)?;
    }

    result
}

/// Read a program from disk, assembling it first for `.asm` files.
fn read_program(path: &Path) -> Result<Vec<u8>, CliError> {
    if path.extension().map_or(false, |ext| ext == "asm") {
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::FileNotFound(path.display().to_string()),
            _ => LoadError::IoError(e.to_string()),
        })?;
        let bytes = ls8::assemble(&source)?;
        info!("assembled {} bytes", bytes.len());
        return Ok(bytes);
    }

    let file = ls8::load_ls8(path)?;
    info!("loaded {} bytes", file.len());
    Ok(file.bytes)
}

/// Run the machine, printing PRN output as it happens.
fn execute(cpu: &mut Cpu, max_cycles: Option<u64>, trace: bool) -> Result<(), CliError> {
    while cpu.is_running() {
        if let Some(max) = max_cycles {
            if cpu.cycles >= max {
                warn!("reached max cycles limit ({}), stopping", max);
                return Ok(());
            }
        }

        if trace {
            eprintln!("{}", cpu.trace());
        }

        let result = cpu.step();
        for value in cpu.take_output() {
            println!("{}", value);
        }
        result?;
    }

    info!("halted after {} cycles", cpu.cycles);
    Ok(())
}

fn write_state(cpu: &Cpu, path: &Path) -> Result<(), CliError> {
    let output_error = |message: String| CliError::Output {
        path: path.to_path_buf(),
        message,
    };

    let json = serde_json::to_string_pretty(cpu).map_err(|e| output_error(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| output_error(e.to_string()))?;
    info!("wrote machine state to {}", path.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn debug_program(program: Vec<u8>, config: CpuConfig) -> Result<(), CliError> {
    info!("launching debugger");
    ls8::run_debugger(program, config).map_err(|e| CliError::Debugger(e.to_string()))
}

#[cfg(not(feature = "tui"))]
fn debug_program(_program: Vec<u8>, _config: CpuConfig) -> Result<(), CliError> {
    Err(CliError::Debugger("built without the `tui` feature".into()))
}

/// Parse a byte given in decimal, `0x` hex or `0b` binary.
fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u8::from_str_radix(bin, 2)
    } else {
        s.parse::<u8>()
    };
    parsed.map_err(|e| format!("'{}' is not a byte: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_wrong_argument_count() {
        assert!(Cli::try_parse_from(["ls8-emu"]).is_err());
        assert!(Cli::try_parse_from(["ls8-emu", "a.ls8", "b.ls8"]).is_err());
        assert!(Cli::try_parse_from(["ls8-emu", "a.ls8"]).is_ok());
    }

    #[test]
    fn test_parse_byte() {
        assert_eq!(parse_byte("244"), Ok(244));
        assert_eq!(parse_byte("0xF4"), Ok(0xF4));
        assert_eq!(parse_byte("0b101"), Ok(5));
        assert!(parse_byte("256").is_err());
    }

    #[test]
    fn test_exit_codes() {
        let missing = CliError::Load(LoadError::FileNotFound("x.ls8".into()));
        let malformed = CliError::Load(LoadError::MalformedLiteral { line: 1, text: "2".into() });
        let fault = CliError::Cpu(CpuError::UnknownOpcode { opcode: 0xFF, address: 0 });

        assert_eq!(missing.exit_code(), 2);
        assert_eq!(malformed.exit_code(), 3);
        assert_eq!(fault.exit_code(), 4);
        assert_eq!(fault.to_string(), "unknown instruction 255 at address 0");
    }

    #[test]
    fn test_execute_prints_until_fault() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[ls8::Opcode::LDI, 0, 8, ls8::Opcode::PRN, 0, 0xFF]).unwrap();

        let err = execute(&mut cpu, None, false).unwrap_err();
        assert!(matches!(err, CliError::Cpu(CpuError::UnknownOpcode { opcode: 0xFF, address: 5 })));
    }

    #[test]
    fn test_execute_respects_max_cycles() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[ls8::Opcode::CALL, 0]).unwrap();

        assert!(execute(&mut cpu, Some(5), false).is_ok());
        assert_eq!(cpu.cycles, 5);
    }
}
