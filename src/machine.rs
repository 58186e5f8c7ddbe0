//! The whole machine: CPU plus devices.
//!
//! Device events are collected between instructions and handed to the CPU,
//! which only looks at them at instruction boundaries. That keeps execution
//! single threaded even though the timer and keyboard run on wall-clock time.

use crate::config::EmulatorConfig;
use crate::cpu::interrupts::TIMER_LINE;
use crate::cpu::memory::MemoryError;
use crate::cpu::{Cpu, CpuError, CpuState, Instruction};
use crate::devices::{KeySource, Output, Timer};
use std::time::{Duration, Instant};
use tracing::debug;

/// What a finished (or paused) run looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions executed during this run.
    pub cycles: u64,
    /// CPU state when the run stopped.
    pub state: CpuState,
    /// Timer firings delivered.
    pub timer_ticks: u64,
    /// Keys delivered.
    pub keys: u64,
}

impl RunSummary {
    /// True if the run stopped on the cycle limit rather than HLT.
    pub fn hit_cycle_limit(&self) -> bool {
        self.state == CpuState::Running
    }
}

pub struct Machine<K: KeySource, O: Output> {
    pub cpu: Cpu,
    timer: Timer,
    keyboard: K,
    output: O,
    config: EmulatorConfig,
    keys_delivered: u64,
}

impl<K: KeySource, O: Output> Machine<K, O> {
    pub fn new(config: EmulatorConfig, keyboard: K, output: O) -> Self {
        Self {
            cpu: Cpu::new(),
            timer: Timer::new(config.timer_period()),
            keyboard,
            output,
            config,
            keys_delivered: 0,
        }
    }

    /// Reset everything and load `image` at address 0.
    pub fn load(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        self.timer.reset();
        self.keys_delivered = 0;
        self.cpu.load_program(image)
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Let `dt` of emulated wall time pass on the timer.
    pub fn advance_timer(&mut self, dt: Duration) {
        if self.timer.advance(dt) {
            self.timer_fired();
        }
    }

    /// Deliver anything the devices produced since the last poll.
    pub fn poll_devices(&mut self, now: Instant) {
        if self.timer.poll(now) {
            self.timer_fired();
        }
        if let Some(key) = self.keyboard.poll_key() {
            debug!(key, "key pressed");
            self.keys_delivered += 1;
            self.cpu.key_pressed(key, self.config.keyboard_line);
        }
    }

    fn timer_fired(&mut self) {
        self.cpu.raise_interrupt(TIMER_LINE);
    }

    /// Poll devices, then execute one instruction.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        self.poll_devices(Instant::now());
        self.cpu.step(&mut self.output)
    }

    /// Run until halt, fault or the configured cycle limit.
    pub fn run(&mut self) -> Result<RunSummary, CpuError> {
        self.run_with(|_| {})
    }

    /// Like [`Machine::run`], calling `before_step` ahead of every instruction.
    pub fn run_with<F: FnMut(&Cpu)>(&mut self, mut before_step: F) -> Result<RunSummary, CpuError> {
        let start = self.cpu.cycles;
        let limit = self.config.max_cycles.map(|max| start + max);
        let delay = self.config.cycle_delay();

        while self.cpu.is_running() {
            if limit.is_some_and(|limit| self.cpu.cycles >= limit) {
                debug!(cycles = self.cpu.cycles - start, "cycle limit reached");
                break;
            }
            before_step(&self.cpu);
            self.step()?;
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        Ok(RunSummary {
            cycles: self.cpu.cycles - start,
            state: self.cpu.state,
            timer_ticks: self.timer.ticks(),
            keys: self.keys_delivered,
        })
    }
}
