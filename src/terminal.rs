use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Back buffer plus raw-mode/alternate-screen guard
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    alternate_screen: bool,
}

#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self { ch: ' ', fg: None, bold: false }
    }
}

impl Terminal {
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
        }

        Ok(Self {
            width,
            height,
            buffer: blank(width, height),
            alternate_screen,
        })
    }

    /// Buffer-only terminal that never touches stdout modes
    pub fn headless(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: blank(width, height),
            alternate_screen: false,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Re-allocate the back buffer for a new terminal size
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = blank(width, height);
    }

    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            row.fill(Cell::default());
        }
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))
    }

    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bold };
        }
    }

    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.buffer.get(y as usize)?.get(x as usize)
    }

    /// Flush the whole back buffer in one write
    pub fn present(&self) -> io::Result<()> {
        let mut out = stdout().lock();
        for (y, row) in self.buffer.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            let mut current: Option<(Option<Color>, bool)> = None;
            for cell in row {
                let style = (cell.fg, cell.bold);
                if current != Some(style) {
                    queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
                    if cell.bold {
                        queue!(out, SetAttribute(Attribute::Bold))?;
                    }
                    if let Some(color) = cell.fg {
                        queue!(out, SetForegroundColor(color))?;
                    }
                    current = Some(style);
                }
                queue!(out, Print(cell.ch))?;
            }
        }
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        out.flush()
    }

    /// Non-blocking key check, returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                if key_event.kind != KeyEventKind::Release {
                    return Ok(Some((key_event.code, key_event.modifiers)));
                }
            }
        }
        Ok(None)
    }

    pub fn sleep(&self, seconds: f32) {
        std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

fn blank(width: u16, height: u16) -> Vec<Vec<Cell>> {
    vec![vec![Cell::default(); width as usize]; height as usize]
}
