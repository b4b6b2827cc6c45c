//! Built-in presets

use crossterm::style::Color;

use super::{rgb, ThemeMap};

/// Default dark theme (Catppuccin Mocha accents)
pub fn dark() -> ThemeMap {
    ThemeMap {
        headings: [rgb(0x89b4fa); 6], // blue
        code: rgb(0xfab387),          // peach
        bold: rgb(0xcdd6f4),          // text
        italic: rgb(0xf5c2e7),        // pink
        link: rgb(0xa6e3a1),          // green
        list: rgb(0xf9e2af),          // yellow
    }
}

/// For light backgrounds (Catppuccin Latte accents)
pub fn light() -> ThemeMap {
    ThemeMap {
        headings: [rgb(0x1e66f5); 6],
        code: rgb(0xfe640b),
        bold: rgb(0x4c4f69),
        italic: rgb(0xea76cb),
        link: rgb(0x40a02b),
        list: rgb(0xdf8e1d),
    }
}

/// Palette colors only, so the terminal's own scheme decides
pub fn mono() -> ThemeMap {
    ThemeMap {
        headings: [Color::White; 6],
        code: Color::Grey,
        bold: Color::White,
        italic: Color::Grey,
        link: Color::White,
        list: Color::DarkGrey,
    }
}
