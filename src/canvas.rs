//! Braille sub-cell canvas
//!
//! Each terminal cell holds a 2x4 grid of dots. Every dot carries an [`Ink`];
//! when several layers hit the same dot the higher-priority ink wins, and a
//! cell takes the colour of its strongest dot.

use crate::actor::Tone;
use crate::terminal::Terminal;
use crossterm::style::Color;

/// What a dot shows, ordered by drawing priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ink {
    #[default]
    Empty,
    Star(u8),
    Night(u8),
    Graticule,
    Surface(u8),
    Coast(u8),
    Atmosphere,
    Trail(Tone, u8),
    Point(Tone, u8),
    Highlight,
}

const DOT_BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

/// 4x4 ordered dither thresholds, in sixteenths
const BAYER: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// True when a dot at (x, y) should light up for brightness in 0..=1
pub fn dither(x: i32, y: i32, brightness: f32) -> bool {
    let threshold = BAYER[y.rem_euclid(4) as usize][x.rem_euclid(4) as usize] as f32 + 0.5;
    brightness * 16.0 > threshold
}

/// Quantize 0..=1 into intensity levels 0..=3
pub fn level(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 3.0).round() as u8
}

pub struct BrailleCanvas {
    width: usize,
    height: usize,
    dots: Vec<Ink>,
}

impl BrailleCanvas {
    /// Canvas covering `cols` x `rows` terminal cells
    pub fn for_cells(cols: u16, rows: u16) -> Self {
        let width = cols as usize * 2;
        let height = rows as usize * 4;
        Self { width, height, dots: vec![Ink::Empty; width * height] }
    }

    /// Size in dots
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.dots.fill(Ink::Empty);
    }

    pub fn get(&self, x: i32, y: i32) -> Ink {
        self.index(x, y).map_or(Ink::Empty, |i| self.dots[i])
    }

    pub fn plot(&mut self, x: i32, y: i32, ink: Ink) {
        if let Some(i) = self.index(x, y) {
            if ink > self.dots[i] {
                self.dots[i] = ink;
            }
        }
    }

    pub fn disc(&mut self, cx: i32, cy: i32, radius: i32, ink: Ink) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.plot(cx + dx, cy + dy, ink);
                }
            }
        }
    }

    pub fn ring(&mut self, cx: i32, cy: i32, radius: i32, ink: Ink) {
        if radius <= 0 {
            self.plot(cx, cy, ink);
            return;
        }
        let steps = (radius * 8).max(8);
        for i in 0..steps {
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            let x = cx + (a.cos() * radius as f32).round() as i32;
            let y = cy + (a.sin() * radius as f32).round() as i32;
            self.plot(x, y, ink);
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Braille glyph and strongest ink for one terminal cell
    pub fn cell(&self, col: u16, row: u16) -> (char, Ink) {
        let bx = col as i32 * 2;
        let by = row as i32 * 4;
        let mut bits = 0u8;
        let mut strongest = Ink::Empty;
        for (dy, row_bits) in DOT_BITS.iter().enumerate() {
            for (dx, bit) in row_bits.iter().enumerate() {
                let ink = self.get(bx + dx as i32, by + dy as i32);
                if ink != Ink::Empty {
                    bits |= bit;
                    strongest = strongest.max(ink);
                }
            }
        }
        let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
        (ch, strongest)
    }

    /// Copy every non-empty cell into the terminal back buffer
    pub fn blit(&self, term: &mut Terminal, palette: impl Fn(Ink) -> Option<(Color, bool)>) {
        let cols = (self.width / 2) as u16;
        let rows = (self.height / 4) as u16;
        for row in 0..rows {
            for col in 0..cols {
                let (ch, ink) = self.cell(col, row);
                if let Some((color, bold)) = palette(ink) {
                    term.set(col as i32, row as i32, ch, Some(color), bold);
                }
            }
        }
    }
}
