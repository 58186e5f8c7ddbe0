//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle, instruction behaviors and
//! interrupt dispatch at instruction boundaries.

use crate::cpu::alu::{self, AluError, AluOutput};
use crate::cpu::decode::{self, Condition, DecodeError, Instruction};
use crate::cpu::interrupts::InterruptController;
use crate::cpu::memory::{MemoryError, KEY_ADDR};
use crate::cpu::registers::Flags;
use crate::cpu::{Memory, Registers};
use crate::devices::Output;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU hit an unrecoverable fault; see [`Cpu::fault`].
    Faulted,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Interrupt status and servicing flag.
    pub interrupts: InterruptController,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// The fault that stopped the CPU, if any.
    pub fault: Option<CpuError>,
    /// First address past the loaded image.
    pub(crate) program_end: u8,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            interrupts: InterruptController::new(),
            state: CpuState::Running,
            cycles: 0,
            fault: None,
            program_end: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to its power-on state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.interrupts.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.fault = None;
        self.program_end = 0;
        self.last_instr = None;
    }

    /// Reset, then copy `program` into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.reset();
        self.mem.load_program(program)?;
        self.program_end = program.len() as u8;
        info!(bytes = program.len(), "program loaded");
        Ok(())
    }

    /// Mark an interrupt line pending. Called by devices between instructions.
    pub fn raise_interrupt(&mut self, line: u8) {
        if self.interrupts.raise(line) {
            trace!(line, "interrupt raised");
        }
    }

    /// Keyboard device entry point: latch `key` at `0xF4` and raise `line`.
    pub fn key_pressed(&mut self, key: u8, line: u8) {
        self.mem.write(KEY_ADDR, key);
        self.raise_interrupt(line);
    }

    /// Execute a single instruction, then service a pending interrupt if one
    /// is ready.
    ///
    /// Returns the instruction that was executed. Any fault moves the CPU to
    /// [`CpuState::Faulted`] and leaves registers and memory as they were
    /// before the faulting instruction.
    pub fn step(&mut self, out: &mut dyn Output) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc;
        let bytes = [
            self.mem.read(pc),
            self.mem.read_offset(pc, 1),
            self.mem.read_offset(pc, 2),
        ];

        // Decode
        let instr = match decode::decode(bytes) {
            Ok(instr) => instr,
            Err(e) => return Err(self.raise_fault(CpuError::decode(e, pc))),
        };
        trace!(pc, ?instr, "execute");

        // Execute
        let next = pc.wrapping_add(instr.len());
        match self.execute(instr, pc, next, out) {
            Ok(new_pc) => {
                self.regs.ir = bytes[0];
                self.regs.pc = new_pc;
            }
            Err(e) => return Err(self.raise_fault(e)),
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        if self.state == CpuState::Running {
            if let Err(e) = self.service_interrupts() {
                return Err(self.raise_fault(e));
            }
        }

        Ok(instr)
    }

    /// Run until halt or fault.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, out: &mut dyn Output) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64, out: &mut dyn Output) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction located at `pc`.
    ///
    /// Returns the new PC; `next` is the address after the instruction.
    /// Every fallible check happens before the first mutation.
    fn execute(
        &mut self,
        instr: Instruction,
        pc: u8,
        next: u8,
        out: &mut dyn Output,
    ) -> Result<u8, CpuError> {
        match instr {
            // ==================== Machine ====================

            Instruction::Nop => {}

            Instruction::Hlt => {
                self.state = CpuState::Halted;
                info!(cycles = self.cycles + 1, "halted");
            }

            // ==================== Data ====================

            Instruction::Ldi { reg, imm } => self.regs.set(reg, imm),

            Instruction::Ld { dst, addr } => {
                let value = self.mem.read(self.regs.get(addr));
                self.regs.set(dst, value);
            }

            Instruction::St { addr, src } => {
                let target = self.regs.get(addr);
                if target == KEY_ADDR {
                    warn!(pc, "ignoring store to keyboard register {:#04x}", KEY_ADDR);
                } else {
                    self.mem.write(target, self.regs.get(src));
                }
            }

            // ==================== ALU ====================

            Instruction::Alu { op, a, b } => {
                match alu::compute(op, self.regs.get(a), self.regs.get(b)) {
                    Ok(AluOutput::Value(v)) => self.regs.set(a, v),
                    Ok(AluOutput::Flags(fl)) => self.regs.fl = fl,
                    Err(AluError::DivisionByZero) => {
                        return Err(CpuError::DivisionByZero { address: pc });
                    }
                }
            }

            Instruction::Addi { reg, imm } => {
                let value = self.regs.get(reg).wrapping_add(imm);
                self.regs.set(reg, value);
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => self.push(self.regs.get(reg))?,

            Instruction::Pop { reg } => {
                let value = self.pop()?;
                self.regs.set(reg, value);
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                let target = self.regs.get(reg);
                self.push(next)?;
                return Ok(target);
            }

            Instruction::Ret => return self.pop(),

            Instruction::Jump { cond, reg } => {
                if condition_holds(cond, self.regs.fl) {
                    return Ok(self.regs.get(reg));
                }
            }

            Instruction::Int { reg } => {
                self.raise_interrupt(self.regs.get(reg) & 0b111);
            }

            Instruction::Iret => {
                // `next` is unused: the saved PC takes its place.
                self.restore_context()?;
                self.interrupts.finish();
                debug!(pc = self.regs.pc, "returned from interrupt");
                return Ok(self.regs.pc);
            }

            // ==================== Output ====================

            Instruction::Prn { reg } => out.number(self.regs.signed(reg)),

            Instruction::Pra { reg } => out.character(self.regs.get(reg) as char),

            Instruction::Prm { start, end } => {
                let (start, end) = (self.regs.get(start), self.regs.get(end));
                let text: String = if start <= end {
                    (start..=end).map(|addr| self.mem.read(addr) as char).collect()
                } else {
                    String::new()
                };
                out.text(&text);
            }
        }

        Ok(next)
    }

    /// Dispatch the highest priority pending, unmasked interrupt.
    fn service_interrupts(&mut self) -> Result<(), CpuError> {
        let Some(line) = self.interrupts.next_line(self.regs.interrupt_mask()) else {
            return Ok(());
        };

        self.save_context()?;
        self.interrupts.begin(line);
        let vector = self.mem.vector(line);
        debug!(line, return_pc = self.regs.pc, vector, "servicing interrupt");
        self.regs.pc = vector;
        Ok(())
    }

    fn raise_fault(&mut self, err: CpuError) -> CpuError {
        error!(pc = self.regs.pc, "cpu fault: {}", err);
        self.state = CpuState::Faulted;
        self.fault = Some(err.clone());
        err
    }

    /// One line of machine state: `TRACE: PC | op a b | R0 .. R7`.
    pub fn trace_line(&self) -> String {
        let pc = self.regs.pc;
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            self.mem.read(pc),
            self.mem.read_offset(pc, 1),
            self.mem.read_offset(pc, 2),
        );
        for value in self.regs.gpr {
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

    /// Check if the CPU stopped on a fault.
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }
}

fn condition_holds(cond: Condition, fl: Flags) -> bool {
    match cond {
        Condition::Always => true,
        Condition::Equal => fl.equal(),
        Condition::NotEqual => !fl.equal(),
        Condition::Greater => fl.greater(),
        Condition::Less => fl.less(),
        Condition::LessOrEqual => fl.less() || fl.equal(),
        Condition::GreaterOrEqual => fl.greater() || fl.equal(),
    }
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
            .field("interrupts", &self.interrupts)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("invalid opcode {opcode:#04x} at {address:#04x}")]
    InvalidOpcode { address: u8, opcode: u8 },

    #[error("invalid register operand {operand} at {address:#04x}")]
    InvalidRegister { address: u8, operand: u8 },

    #[error("division by zero at {address:#04x}")]
    DivisionByZero { address: u8 },

    #[error("stack overflow (SP={sp:#04x})")]
    StackOverflow { sp: u8 },

    #[error("stack underflow (SP={sp:#04x})")]
    StackUnderflow { sp: u8 },
}

impl CpuError {
    fn decode(err: DecodeError, address: u8) -> Self {
        match err {
            DecodeError::InvalidOpcode(opcode) => CpuError::InvalidOpcode { address, opcode },
            DecodeError::InvalidRegister(operand) => CpuError::InvalidRegister { address, operand },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::alu::AluOp;
    use crate::cpu::decode::encode;
    use crate::cpu::interrupts::{InterruptState, TIMER_LINE};
    use crate::cpu::registers::{IM, SP};
    use crate::devices::CaptureOutput;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn alu(op: AluOp, a: u8, b: u8) -> Instruction {
        Instruction::Alu { op, a, b }
    }

    fn ldi(reg: u8, imm: u8) -> Instruction {
        Instruction::Ldi { reg, imm }
    }

    fn loaded(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(instructions)).unwrap();
        cpu
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = loaded(&[Instruction::Hlt]);
        let mut out = CaptureOutput::new();

        let executed = cpu.run(&mut out).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.step(&mut out), Err(CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_print_eight() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]).unwrap();
        let mut out = CaptureOutput::new();

        assert_eq!(cpu.run(&mut out).unwrap(), 3);
        assert_eq!(out.numbers(), vec![8]);
    }

    #[test]
    fn test_invalid_opcode_faults() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0b1000_0010, 0, 1, 0xFF, 0b1000_0010, 0, 2, 0x01]).unwrap();
        let mut out = CaptureOutput::new();

        let err = cpu.run(&mut out).unwrap_err();

        assert_eq!(err, CpuError::InvalidOpcode { address: 3, opcode: 0xFF });
        assert!(cpu.is_faulted());
        assert_eq!(cpu.fault, Some(err));
        assert_eq!(cpu.regs.get(0), 1);
        assert_eq!(cpu.regs.pc, 3);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_division_by_zero_leaves_destination() {
        let mut cpu = loaded(&[
            ldi(0, 30),
            alu(AluOp::Div, 0, 1),
            Instruction::Hlt,
        ]);
        let mut out = CaptureOutput::new();

        let err = cpu.run(&mut out).unwrap_err();

        assert_eq!(err, CpuError::DivisionByZero { address: 3 });
        assert_eq!(cpu.regs.get(0), 30);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn test_mod_by_zero_faults() {
        let mut cpu = loaded(&[ldi(0, 7), alu(AluOp::Mod, 0, 2), Instruction::Hlt]);
        let mut out = CaptureOutput::new();
        assert!(matches!(cpu.run(&mut out), Err(CpuError::DivisionByZero { .. })));
        assert_eq!(cpu.regs.get(0), 7);
    }

    #[test]
    fn test_call_and_ret() {
        // 0: LDI R1,8  3: CALL R1  5: PRN R0  7: HLT  8: LDI R0,99  11: RET
        let mut cpu = loaded(&[
            ldi(1, 8),
            Instruction::Call { reg: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
            ldi(0, 99),
            Instruction::Ret,
        ]);
        let mut out = CaptureOutput::new();

        cpu.run(&mut out).unwrap();

        assert_eq!(out.numbers(), vec![99]);
        assert_eq!(cpu.regs.sp(), 0xF3);
    }

    #[test]
    fn test_stack_cannot_reach_device_region() {
        // LDI R7,0xF5; LDI R0,0x41; PUSH R0; HLT
        let mut cpu = loaded(&[
            ldi(SP, 0xF5),
            ldi(0, 0x41),
            Instruction::Push { reg: 0 },
            Instruction::Hlt,
        ]);
        let mut out = CaptureOutput::new();
        assert_eq!(cpu.run(&mut out), Err(CpuError::StackOverflow { sp: 0xF5 }));
        assert!(cpu.is_faulted());
        assert_eq!(cpu.mem.read(KEY_ADDR), 0);
        assert_eq!(cpu.regs.pc, 6);

        // LDI R7,0xFA; LDI R1,8; CALL R1
        let mut cpu = loaded(&[
            ldi(SP, 0xFA),
            ldi(1, 8),
            Instruction::Call { reg: 1 },
        ]);
        cpu.mem.write(0xF9, 0x30);
        assert_eq!(cpu.run(&mut out), Err(CpuError::StackOverflow { sp: 0xFA }));
        assert_eq!(cpu.mem.vector(1), 0x30);
        assert_eq!(cpu.regs.pc, 6);
    }

    #[test]
    fn test_ret_on_empty_stack_faults() {
        let mut cpu = loaded(&[Instruction::Ret]);
        let mut out = CaptureOutput::new();
        assert_eq!(cpu.run(&mut out), Err(CpuError::StackUnderflow { sp: 0xF3 }));
    }

    #[test]
    fn test_conditional_jumps() {
        // CMP R0,R1 with 3 < 5, then JEQ (not taken) and JLT (taken).
        let mut cpu = loaded(&[
            ldi(0, 3),             // 0
            ldi(1, 5),             // 3
            ldi(2, 19),            // 6
            alu(AluOp::Cmp, 0, 1), // 9
            Instruction::Jump { cond: Condition::Equal, reg: 2 }, // 12
            Instruction::Jump { cond: Condition::Less, reg: 2 },  // 14
            Instruction::Prn { reg: 0 }, // 16: skipped
            Instruction::Hlt,            // 18
            Instruction::Prn { reg: 1 }, // 19
            Instruction::Hlt,
        ]);
        let mut out = CaptureOutput::new();

        cpu.run(&mut out).unwrap();

        assert_eq!(out.numbers(), vec![5]);
        assert!(cpu.regs.fl.less());
        assert_eq!(cpu.regs.get(0), 3);
        assert_eq!(cpu.regs.get(1), 5);
    }

    #[test]
    fn test_condition_table() {
        let eq = Flags::from_bits(Flags::EQUAL);
        let gt = Flags::from_bits(Flags::GREATER);
        let lt = Flags::from_bits(Flags::LESS);

        assert!(condition_holds(Condition::NotEqual, gt));
        assert!(!condition_holds(Condition::NotEqual, eq));
        assert!(condition_holds(Condition::LessOrEqual, eq));
        assert!(condition_holds(Condition::LessOrEqual, lt));
        assert!(!condition_holds(Condition::LessOrEqual, gt));
        assert!(condition_holds(Condition::GreaterOrEqual, gt));
        assert!(!condition_holds(Condition::GreaterOrEqual, lt));
    }

    #[test]
    fn test_store_to_keyboard_register_is_ignored() {
        let mut cpu = loaded(&[
            ldi(0, KEY_ADDR),
            ldi(1, 0x55),
            Instruction::St { addr: 0, src: 1 },
            ldi(0, 0x80),
            Instruction::St { addr: 0, src: 1 },
            Instruction::Hlt,
        ]);
        cpu.run(&mut CaptureOutput::new()).unwrap();

        assert_eq!(cpu.mem.read(KEY_ADDR), 0);
        assert_eq!(cpu.mem.read(0x80), 0x55);
    }

    #[test]
    fn test_print_char_and_memory() {
        let mut cpu = loaded(&[
            ldi(0, b'H'),
            Instruction::Pra { reg: 0 },
            ldi(1, 0x80),
            ldi(2, 0x81),
            Instruction::Prm { start: 1, end: 2 },
            Instruction::Prn { reg: 2 },
            Instruction::Hlt,
        ]);
        cpu.mem.write(0x80, b'h');
        cpu.mem.write(0x81, b'i');
        let mut out = CaptureOutput::new();

        cpu.run(&mut out).unwrap();

        assert_eq!(out.lines(), vec!["H", "hi", "-127"]);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_timer_interrupt_dispatch_and_return() {
        // Main: enable I0, then spin. Handler at 0x20 prints R0 and returns.
        let mut cpu = loaded(&[
            ldi(IM, 0b0000_0001),             // 0
            ldi(0, 7),                        // 3
            ldi(2, 6),                        // 6
            Instruction::Jump { cond: Condition::Always, reg: 2 }, // 9 (loops to 6)
        ]);
        let handler = make_program(&[ldi(0, 42), Instruction::Prn { reg: 0 }, Instruction::Iret]);
        for (i, byte) in handler.iter().enumerate() {
            cpu.mem.write(0x20 + i as u8, *byte);
        }
        cpu.mem.write(0xF8, 0x20);
        let mut out = CaptureOutput::new();

        cpu.run_limited(4, &mut out).unwrap();
        let before = cpu.regs.clone();
        assert_eq!(before.pc, 6);

        cpu.raise_interrupt(TIMER_LINE);
        cpu.step(&mut out).unwrap(); // LDI R2,6, then dispatch
        assert_eq!(cpu.regs.pc, 0x20);
        assert_eq!(cpu.interrupts.state(), InterruptState::Servicing);

        cpu.run_limited(3, &mut out).unwrap(); // LDI, PRN, IRET
        assert_eq!(out.numbers(), vec![42]);
        assert_eq!(cpu.interrupts.state(), InterruptState::Idle);
        assert_eq!(cpu.regs.pc, 9);
        assert_eq!(cpu.regs.gpr, before.gpr);
        assert_eq!(cpu.regs.fl, before.fl);
    }

    #[test]
    fn test_masked_interrupt_waits() {
        let mut cpu = loaded(&[Instruction::Nop, Instruction::Nop, Instruction::Hlt]);
        cpu.raise_interrupt(TIMER_LINE);
        let mut out = CaptureOutput::new();

        cpu.run(&mut out).unwrap();

        assert!(cpu.is_halted());
        assert!(cpu.interrupts.is_pending(TIMER_LINE));
    }

    #[test]
    fn test_int_instruction_raises_line() {
        let mut cpu = loaded(&[ldi(0, 3), Instruction::Int { reg: 0 }, Instruction::Hlt]);
        cpu.run(&mut CaptureOutput::new()).unwrap();
        assert!(cpu.interrupts.is_pending(3));
    }

    #[test]
    fn test_trace_line() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0x00, 0x08]).unwrap();
        assert_eq!(
            cpu.trace_line(),
            "TRACE: 00 | 82 00 08 | 00 00 00 00 00 00 00 F3"
        );
    }

    #[test]
    fn test_state_serializes() {
        let cpu = loaded(&[Instruction::Hlt]);
        let json = serde_json::to_string(&cpu).unwrap();
        let back: Cpu = serde_json::from_str(&json).unwrap();
        assert_eq!(back.regs, cpu.regs);
        assert_eq!(back.mem.read(0), 0x01);
    }
}
