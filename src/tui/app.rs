//! Debugger application state and logic.

use crate::config::EmulatorConfig;
use crate::cpu::interrupts::TIMER_LINE;
use crate::cpu::memory::MEMORY_SIZE;
use crate::devices::{CaptureOutput, Timer};
use crate::program::disasm::{disassemble_at, format_instruction};
use crate::Cpu;
use std::collections::HashSet;
use std::time::Instant;

/// Bytes shown per memory row.
pub const ROW_BYTES: usize = 16;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original image for reset.
    pub program: Vec<u8>,
    /// Everything the program printed.
    pub output: CaptureOutput,
    /// Wall-clock timer feeding `I0`.
    pub timer: Timer,
    pub config: EmulatorConfig,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Typed characters go to the emulated keyboard.
    pub input_mode: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>, config: EmulatorConfig) -> Self {
        let mut app = Self {
            cpu: Cpu::new(),
            program,
            output: CaptureOutput::new(),
            timer: Timer::new(config.timer_period()),
            config,
            breakpoints: HashSet::new(),
            running: false,
            input_mode: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        if self.timer.poll(Instant::now()) {
            self.cpu.raise_interrupt(TIMER_LINE);
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step(&mut self.output) {
            Ok(instr) => {
                self.status = format!("PC={:02X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or fault.
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
            self.status = format!("Stopped after {} cycles: {:?}", self.cpu.cycles, self.cpu.state);
            return;
        }

        self.step();

        // Check for breakpoint
        let pc = self.cpu.regs.pc;
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", pc);
        }
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

    /// Deliver a key to the emulated keyboard.
    pub fn key_pressed(&mut self, key: u8) {
        self.cpu.key_pressed(key, self.config.keyboard_line);
        self.status = format!("Key {:#04x} latched", key);
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        if let Err(e) = self.cpu.load_program(&self.program) {
            self.status = format!("Load error: {}", e);
        } else {
            self.status = "Reset. Ready.".into();
        }
        self.output.clear();
        self.timer.reset();
        self.running = false;
    }

    pub fn scroll_memory(&mut self, delta: isize) {
        let max = MEMORY_SIZE / ROW_BYTES - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(delta).min(max);
    }

    /// Disassembly window of `lines` entries around the current PC.
    ///
    /// Decodes linearly from address 0, realigning on PC if an earlier
    /// instruction would straddle it.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u8, String, bool)> {
        let pc = self.cpu.regs.pc as usize;
        let mut listing = Vec::new();
        let mut addr = 0usize;

        while addr < MEMORY_SIZE {
            let (text, size) = disassemble_at(&self.cpu.mem, addr as u8);
            listing.push((addr as u8, text, addr == pc));
            let next = addr + size as usize;
            addr = if addr < pc && next > pc { pc } else { next };
        }

        let current = listing.iter().position(|(_, _, is_pc)| *is_pc).unwrap_or(0);
        let start = current.saturating_sub(lines / 2);
        listing.into_iter().skip(start).take(lines).collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>, config: EmulatorConfig) -> std::io::Result<()> {
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

    // Create app
    let mut app = DebuggerApp::new(program, config);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        let timeout = if app.running { Duration::from_millis(1) } else { Duration::from_millis(50) };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.input_mode {
                        match key.code {
                            KeyCode::Esc => {
                                app.input_mode = false;
                                app.status = "Left input mode.".into();
                            }
                            KeyCode::Enter => app.key_pressed(b'\n'),
                            KeyCode::Char(c) if c.is_ascii() => app.key_pressed(c as u8),
                            _ => {}
                        }
                    } else {
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
                            KeyCode::Char('i') => {
                                app.input_mode = true;
                                app.status = "Input mode: keys go to the LS-8, Esc to leave.".into();
                            }
                            KeyCode::Up => app.scroll_memory(-1),
                            KeyCode::Down => app.scroll_memory(1),
                            _ => {}
                        }
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
