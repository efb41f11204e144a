use crate::actor::Tone;
use crate::canvas::Ink;
use crossterm::event::KeyCode;
use crossterm::style::Color;

/// Active colour scheme for the globe surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorState {
    pub scheme: u8,
}

impl ColorState {
    pub fn new(default_scheme: u8) -> Self {
        Self { scheme: default_scheme }
    }

    /// Shift+digit selects a scheme. Returns true if the key was handled.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        self.scheme = match code {
            KeyCode::Char('!') => 1, // fire
            KeyCode::Char('@') => 2, // ice
            KeyCode::Char('#') => 3, // pink
            KeyCode::Char('$') => 4, // gold
            KeyCode::Char('%') => 5, // electric
            KeyCode::Char('^') => 6, // lava
            KeyCode::Char('&') => 7, // mono
            KeyCode::Char('*') => 8, // rainbow
            KeyCode::Char('(') => 9, // neon
            KeyCode::Char(')') => 0, // matrix
            _ => return false,
        };
        true
    }

    pub fn is_mono(&self) -> bool {
        self.scheme == 7
    }
}

impl Default for ColorState {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Colour from a scheme by intensity (0-3)
pub fn scheme_color(scheme: u8, intensity: u8, bold: bool) -> (Color, bool) {
    match scheme {
        1 => match intensity {
            0 => (Color::DarkRed, false),
            1 => (Color::Red, false),
            2 => (Color::DarkYellow, bold),
            _ => (Color::Yellow, true),
        },
        2 => match intensity {
            0 => (Color::DarkBlue, false),
            1 => (Color::Blue, false),
            2 => (Color::Cyan, bold),
            _ => (Color::Cyan, true),
        },
        3 => match intensity {
            0 => (Color::DarkMagenta, false),
            1 => (Color::Magenta, false),
            2 => (Color::Magenta, bold),
            _ => (Color::AnsiValue(13), true),
        },
        4 => match intensity {
            0 => (Color::DarkYellow, false),
            1 => (Color::Yellow, false),
            2 => (Color::Yellow, bold),
            _ => (Color::AnsiValue(11), true),
        },
        5 => match intensity {
            0 => (Color::DarkCyan, false),
            1 => (Color::Cyan, false),
            2 => (Color::Cyan, bold),
            _ => (Color::AnsiValue(14), true),
        },
        6 => match intensity {
            0 => (Color::DarkRed, false),
            1 => (Color::Red, false),
            2 => (Color::Magenta, bold),
            _ => (Color::AnsiValue(9), true),
        },
        7 => match intensity {
            0 => (Color::DarkGrey, false),
            1 => (Color::Grey, false),
            2 => (Color::White, bold),
            _ => (Color::White, true),
        },
        8 => match intensity {
            0 => (Color::Red, false),
            1 => (Color::Yellow, false),
            2 => (Color::Green, bold),
            _ => (Color::Cyan, true),
        },
        9 => match intensity {
            0 => (Color::DarkBlue, false),
            1 => (Color::Blue, false),
            2 => (Color::Magenta, bold),
            _ => (Color::AnsiValue(13), true),
        },
        _ => match intensity {
            0 => (Color::DarkGreen, false),
            1 => (Color::Green, false),
            2 => (Color::Green, true),
            _ => (Color::AnsiValue(10), true),
        },
    }
}

/// Marker colour by outcome, dimming with opacity level (0-3).
///
/// Outcome colours stay fixed across schemes so success and failure never
/// collapse into one hue.
pub fn tone_color(tone: Tone, level: u8) -> (Color, bool) {
    match (tone, level) {
        (Tone::Affirmative, 0) => (Color::DarkGreen, false),
        (Tone::Affirmative, 1) => (Color::Green, false),
        (Tone::Affirmative, _) => (Color::Green, true),
        (Tone::Failure, 0) => (Color::DarkRed, false),
        (Tone::Failure, 1) => (Color::Red, false),
        (Tone::Failure, _) => (Color::Red, true),
    }
}

/// Colour for one canvas cell
pub fn ink_color(scheme: u8, ink: Ink) -> Option<(Color, bool)> {
    let color = match ink {
        Ink::Empty => return None,
        Ink::Star(level) => (if level >= 2 { Color::White } else { Color::DarkGrey }, false),
        Ink::Night(_) => scheme_color(scheme, 0, false),
        Ink::Graticule => scheme_color(scheme, 0, false),
        Ink::Surface(level) => scheme_color(scheme, level.min(2), false),
        Ink::Coast(level) => scheme_color(scheme, level.saturating_add(1).min(3), level >= 2),
        Ink::Atmosphere => scheme_color(scheme, 1, false),
        Ink::Trail(tone, level) => tone_color(tone, level.min(1)),
        Ink::Point(tone, level) => tone_color(tone, level),
        Ink::Highlight => (Color::Yellow, true),
    };
    Some(color)
}

/// Map a semantic status to the active scheme
pub fn status_to_scheme(scheme: u8, status: StatusColor) -> Color {
    if scheme == 7 {
        match status {
            StatusColor::Good => Color::Green,
            StatusColor::Warning => Color::Yellow,
            StatusColor::Critical => Color::Red,
            StatusColor::Info => Color::Cyan,
            StatusColor::Muted => Color::DarkGrey,
        }
    } else {
        let intensity = match status {
            StatusColor::Muted => 0,
            StatusColor::Info => 1,
            StatusColor::Good | StatusColor::Warning => 2,
            StatusColor::Critical => 3,
        };
        scheme_color(scheme, intensity, false).0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Good,
    Warning,
    Critical,
    Info,
    Muted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifted_digits_select_schemes() {
        let mut colors = ColorState::default();
        assert!(colors.handle_key(KeyCode::Char('&')));
        assert!(colors.is_mono());
        assert!(colors.handle_key(KeyCode::Char(')')));
        assert_eq!(colors.scheme, 0);
        assert!(!colors.handle_key(KeyCode::Char('x')));
        assert_eq!(colors.scheme, 0);
    }

    #[test]
    fn outcome_colours_ignore_scheme() {
        for scheme in 0..10 {
            let ok = ink_color(scheme, Ink::Point(Tone::Affirmative, 3));
            let bad = ink_color(scheme, Ink::Point(Tone::Failure, 3));
            assert_ne!(ok, bad);
        }
        assert_eq!(ink_color(4, Ink::Empty), None);
    }
}
