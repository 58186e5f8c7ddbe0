//! Disassembler for LS-8 programs.
//!
//! Converts bytes back to readable assembly.

use crate::cpu::decode::{decode, encode, Condition, Instruction};
use crate::cpu::Memory;

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Nop => "NOP".to_string(),
        Instruction::Hlt => "HLT".to_string(),
        Instruction::Ret => "RET".to_string(),
        Instruction::Iret => "IRET".to_string(),

        Instruction::Ldi { reg, imm } => format!("LDI R{},{}", reg, imm),
        Instruction::Ld { dst, addr } => format!("LD R{},R{}", dst, addr),
        Instruction::St { addr, src } => format!("ST R{},R{}", addr, src),

        Instruction::Alu { op, a, .. } if op.is_unary() => format!("{} R{}", op.mnemonic(), a),
        Instruction::Alu { op, a, b } => format!("{} R{},R{}", op.mnemonic(), a, b),
        Instruction::Addi { reg, imm } => format!("ADDI R{},{}", reg, imm),

        Instruction::Push { reg } => format!("PUSH R{}", reg),
        Instruction::Pop { reg } => format!("POP R{}", reg),
        Instruction::Call { reg } => format!("CALL R{}", reg),
        Instruction::Jump { cond, reg } => format!("{} R{}", jump_mnemonic(cond), reg),
        Instruction::Int { reg } => format!("INT R{}", reg),

        Instruction::Prn { reg } => format!("PRN R{}", reg),
        Instruction::Pra { reg } => format!("PRA R{}", reg),
        Instruction::Prm { start, end } => format!("PRM R{},R{}", start, end),
    }
}

fn jump_mnemonic(cond: Condition) -> &'static str {
    match cond {
        Condition::Always => "JMP",
        Condition::Equal => "JEQ",
        Condition::NotEqual => "JNE",
        Condition::Greater => "JGT",
        Condition::Less => "JLT",
        Condition::LessOrEqual => "JLE",
        Condition::GreaterOrEqual => "JGE",
    }
}

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of bytes it spans. Undecodable bytes
/// come back as a one byte `DB` directive.
pub fn disassemble_at(mem: &Memory, addr: u8) -> (String, u8) {
    let bytes = [mem.read(addr), mem.read_offset(addr, 1), mem.read_offset(addr, 2)];
    match decode(bytes) {
        Ok(instr) => (format_instruction(&instr), instr.len()),
        Err(_) => (format!("DB {:#04x}", bytes[0]), 1),
    }
}

/// Disassemble a whole image.
pub fn disassemble(program: &[u8]) -> String {
    let mut mem = Memory::new();
    let len = program.len().min(crate::cpu::memory::MEMORY_SIZE);
    for (i, byte) in program[..len].iter().enumerate() {
        mem.write(i as u8, *byte);
    }

    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut addr = 0usize;
    while addr < len {
        let (text, size) = disassemble_at(&mem, addr as u8);
        let size = (size as usize).min(len - addr);
        let raw: Vec<String> = program[addr..addr + size]
            .iter()
            .map(|b| format!("{:08b}", b))
            .collect();
        output.push_str(&format!("{:02X}: {:<14} ; {}\n", addr, text, raw.join(" ")));
        addr += size;
    }

    output
}

/// Disassemble a single instruction, e.g. for trace output.
pub fn disassemble_instruction(instr: &Instruction) -> String {
    let bytes: Vec<String> = encode(instr).iter().map(|b| format!("{:02X}", b)).collect();
    format!("{:<14} [{}]", format_instruction(instr), bytes.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::AluOp;

    #[test]
    fn test_format() {
        assert_eq!(format_instruction(&Instruction::Ldi { reg: 0, imm: 8 }), "LDI R0,8");
        assert_eq!(
            format_instruction(&Instruction::Alu { op: AluOp::Not, a: 2, b: 0 }),
            "NOT R2"
        );
        assert_eq!(
            format_instruction(&Instruction::Alu { op: AluOp::Cmp, a: 0, b: 1 }),
            "CMP R0,R1"
        );
        assert_eq!(
            format_instruction(&Instruction::Jump { cond: Condition::GreaterOrEqual, reg: 3 }),
            "JGE R3"
        );
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[0x82, 0x00, 0x08, 0x47, 0x00, 0xFF, 0x01]);
        let lines: Vec<&str> = listing.lines().skip(3).collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("00: LDI R0,8"));
        assert!(lines[1].starts_with("03: PRN R0"));
        assert!(lines[2].starts_with("05: DB 0xff"));
        assert!(lines[3].starts_with("06: HLT"));
    }

    #[test]
    fn test_truncated_instruction_at_end() {
        // LDI with its operands cut off still lists without panicking.
        let listing = disassemble(&[0x82]);
        assert!(listing.contains("00: LDI R0,0"));
    }
}
