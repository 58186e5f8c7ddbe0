//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::memory::{IVT_BASE, KEY_ADDR};
use crate::cpu::registers::{IM, SP};
use crate::cpu::InterruptState;
use super::app::{DebuggerApp, ROW_BYTES};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(55),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory, program output and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_output(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw disassembly view.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:02X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;

    let reg_spans = |range: std::ops::Range<u8>| -> Line<'static> {
        let mut spans = Vec::new();
        for r in range {
            let name = match r {
                IM => format!("R{}/IM ", r),
                SP => format!("R{}/SP ", r),
                _ => format!("R{} ", r),
            };
            spans.push(Span::raw(name));
            spans.push(Span::styled(
                format!("{:02X}({:>4})  ", regs.get(r), regs.signed(r)),
                Style::default().fg(Color::White),
            ));
        }
        Line::from(spans)
    };

    let interrupt_style = match app.cpu.interrupts.state() {
        InterruptState::Idle => Style::default().fg(Color::Gray),
        InterruptState::Pending => Style::default().fg(Color::Yellow),
        InterruptState::Servicing => Style::default().fg(Color::Magenta),
    };

    let content = vec![
        reg_spans(0..4),
        reg_spans(4..8),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:02X}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   IR: "),
            Span::styled(format!("{:02X}", regs.ir), Style::default().fg(Color::White)),
            Span::raw(format!("   {:?}", regs.fl)),
        ]),
        Line::from(vec![
            Span::raw("IS: "),
            Span::styled(format!("{:08b}", app.cpu.interrupts.status()), interrupt_style),
            Span::raw("   IM: "),
            Span::styled(format!("{:08b}", regs.interrupt_mask()), Style::default().fg(Color::White)),
            Span::raw("   "),
            Span::styled(format!("{:?}", app.cpu.interrupts.state()), interrupt_style),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view, one row of 16 bytes per line.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(256 / ROW_BYTES);
    let pc = app.cpu.regs.pc;
    let sp = app.cpu.regs.sp();

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let base = (row * ROW_BYTES) as u8;
            let mut spans = vec![Span::styled(
                format!("{:02X}: ", base),
                Style::default().fg(Color::DarkGray),
            )];

            for (addr, value) in app.cpu.mem.dump(base, ROW_BYTES) {
                let style = if addr == pc {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if addr == sp {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else if addr >= IVT_BASE || addr == KEY_ADDR {
                    Style::default().fg(Color::Magenta)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02X} ", value), style));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw the tail of the program's output.
fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible = (area.height as usize).saturating_sub(2);
    let lines = app.output.lines();
    let tail: Vec<Line> = lines
        .iter()
        .skip(lines.len().saturating_sub(visible))
        .map(|line| Line::from(line.as_str()))
        .collect();

    let output = Paragraph::new(tail)
        .block(Block::default()
            .title(" Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(output, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let style = if app.input_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    let status = Paragraph::new(app.status.clone())
        .style(style)
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  i: Type keys"),
        Line::from("x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
