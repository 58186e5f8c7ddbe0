//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an `.ls8` or binary image
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu disasm <program>` - Disassemble an image

use clap::{Parser, Subcommand};
use ls8::devices::{KeySource, NoKeys, ScriptedKeys, StdinKeys, StdoutOutput};
use ls8::program::disassemble_instruction;
use ls8::{EmulatorConfig, Machine, ProgramImage};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LS-8 8-bit microcomputer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 or binary image to execute
        program: String,
        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,
        /// Maximum number of instructions to run
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print a trace line before every instruction
        #[arg(short = 'd', long)]
        trace: bool,
        /// Timer period in milliseconds (0 disables the timer)
        #[arg(long)]
        timer_ms: Option<u64>,
        /// Pause after every instruction, in microseconds
        #[arg(long)]
        delay_us: Option<u64>,
        /// Type these keys instead of reading stdin
        #[arg(short, long)]
        keys: Option<String>,
        /// Instructions between scripted keys
        #[arg(long, default_value = "50")]
        key_interval: u32,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .ls8 or binary image to debug
        program: String,
        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the .ls8 or binary image
        program: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            config,
            max_cycles,
            trace,
            timer_ms,
            delay_us,
            keys,
            key_interval,
            dump_state,
        }) => {
            let mut config = load_config(config.as_deref());
            if max_cycles.is_some() {
                config.max_cycles = max_cycles;
            }
            if let Some(ms) = timer_ms {
                config.timer_period_ms = ms;
            }
            if let Some(us) = delay_us {
                config.cycle_delay_us = us;
            }
            config.trace |= trace;

            let keyboard: Box<dyn KeySource> = match keys {
                Some(keys) => Box::new(ScriptedKeys::new(keys.into_bytes(), key_interval)),
                None => match StdinKeys::spawn() {
                    Ok(stdin) => Box::new(stdin),
                    Err(e) => {
                        tracing::warn!("keyboard unavailable: {}", e);
                        Box::new(NoKeys)
                    }
                },
            };

            run_program(&program, config, keyboard, dump_state);
        }
        Some(Commands::Debug { program, config }) => {
            debug_program(&program, load_config(config.as_deref()));
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        None => {
            println!("LS-8 Emulator v0.1.0");
            println!("An 8-bit microcomputer emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn load_config(path: Option<&str>) -> EmulatorConfig {
    let Some(path) = path else {
        return EmulatorConfig::default();
    };
    match EmulatorConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config {}: {}", path, e);
            process::exit(1);
        }
    }
}

fn load_image(path: &str) -> ProgramImage {
    let image = match ls8::load_program(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", path, e);
            process::exit(1);
        }
    };

    if image.is_empty() {
        eprintln!("❌ No instructions to execute");
        process::exit(1);
    }

    image
}

fn run_program(path: &str, config: EmulatorConfig, keyboard: Box<dyn KeySource>, dump_state: bool) {
    let image = load_image(path);
    tracing::info!(path, bytes = image.len(), "loaded program");

    let mut machine = Machine::new(config, keyboard, StdoutOutput::new());
    let trace = machine.config().trace;
    if let Err(e) = machine.load(&image.bytes) {
        eprintln!("❌ Failed to load program: {}", e);
        process::exit(1);
    }

    let result = machine.run_with(|cpu| {
        if trace {
            let (text, _) = ls8::program::disassemble_at(&cpu.mem, cpu.regs.pc);
            eprintln!("{} | {}", cpu.trace_line(), text);
        }
    });

    if dump_state {
        match serde_json::to_string_pretty(&machine.cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }

    match result {
        Ok(summary) => {
            tracing::info!(
                cycles = summary.cycles,
                timer_ticks = summary.timer_ticks,
                keys = summary.keys,
                state = ?summary.state,
                "run finished"
            );
            if summary.hit_cycle_limit() {
                eprintln!(
                    "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
                    summary.cycles
                );
            }
        }
        Err(e) => {
            let last = machine
                .cpu
                .last_instruction()
                .map(|instr| disassemble_instruction(&instr))
                .unwrap_or_else(|| "-".to_string());
            eprintln!("❌ CPU fault: {}", e);
            eprintln!("   {}", machine.cpu.trace_line());
            eprintln!("   last instruction: {}", last);
            process::exit(1);
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: EmulatorConfig) {
    let image = load_image(path);

    if let Err(e) = ls8::run_debugger(image.bytes, config) {
        eprintln!("❌ Debugger error: {}", e);
        process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: EmulatorConfig) {
    eprintln!("❌ Built without the `tui` feature; the debugger is unavailable");
    process::exit(1);
}

fn disassemble_file(path: &str) {
    let image = load_image(path);
    println!("{}", ls8::disassemble(&image.bytes));
}
