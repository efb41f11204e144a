use crate::terminal::Terminal;
use crossterm::style::Color;

/// Render a centered help box with the provided text into the back buffer.
pub fn render_help_overlay(term: &mut Terminal, width: u16, height: u16, help_text: &str) {
    if help_text.is_empty() {
        return;
    }

    let lines: Vec<&str> = help_text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4;
    let box_height = lines.len() + 2;

    let x0 = (width as usize).saturating_sub(box_width) / 2;
    let y0 = (height as usize).saturating_sub(box_height) / 2;
    let right = x0 + box_width - 1;
    let bottom = y0 + box_height - 1;

    let border = Some(Color::White);
    let text = Some(Color::Grey);

    let horizontal = "─".repeat(box_width - 2);
    term.set_str(x0 as i32, y0 as i32, &format!("┌{horizontal}┐"), border, false);
    for (i, line) in lines.iter().enumerate() {
        let y = (y0 + 1 + i) as i32;
        let padding = max_width.saturating_sub(line.chars().count());
        term.set(x0 as i32, y, '│', border, false);
        term.set_str(x0 as i32 + 1, y, &format!(" {line}{} ", " ".repeat(padding)), text, false);
        term.set(right as i32, y, '│', border, false);
    }
    term.set_str(x0 as i32, bottom as i32, &format!("└{horizontal}┘"), border, false);
}
