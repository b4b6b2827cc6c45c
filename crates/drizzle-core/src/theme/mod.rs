//! Theme resolution
//!
//! A `ThemeMap` assigns a color to every element kind. It is built once by
//! layering, in increasing priority: a built-in preset, a theme file, the
//! environment, and command-line overrides. Bad values never fail the build;
//! they become a `ThemeWarning` and the default foreground.

use std::fmt;
use std::str::FromStr;

use crossterm::style::Color;
use serde_json::Value;
use thiserror::Error;

pub mod builder;
pub mod presets;

pub use builder::{load_theme_file, ThemeBuilder};

/// Number of heading levels
pub const HEADING_LEVELS: usize = 6;

/// Color used whenever a configured value is unusable
pub const DEFAULT_FOREGROUND: Color = Color::Reset;

/// Prefix of the environment override variables
pub const ENV_PREFIX: &str = "DRIZZLE_COLOR_";

/// Theme keys accepted in files, the environment, and `--color`
pub const THEME_KEYS: [&str; 6] = ["heading", "code", "bold", "italic", "link", "list"];

/// Built-in presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Preset {
    #[default]
    Dark,
    Light,
    Mono,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Dark => "dark",
            Preset::Light => "light",
            Preset::Mono => "mono",
        }
    }

    pub fn theme(&self) -> ThemeMap {
        match self {
            Preset::Dark => presets::dark(),
            Preset::Light => presets::light(),
            Preset::Mono => presets::mono(),
        }
    }
}

impl FromStr for Preset {
    type Err = ThemeWarning;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Preset::Dark),
            "light" => Ok(Preset::Light),
            "mono" | "monochrome" => Ok(Preset::Mono),
            _ => Err(ThemeWarning::UnknownPreset(s.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic element kinds that carry a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Heading level, 1 through 6
    Heading(u8),
    Bold,
    Italic,
    Code,
    Link,
    List,
}

/// Recoverable theme problems
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThemeWarning {
    #[error("{origin}: invalid color `{value}` for `{key}`, using the default foreground")]
    InvalidColor {
        origin: String,
        key: String,
        value: String,
    },

    #[error("{origin}: `{key}` must be {expected}, using the default foreground")]
    WrongType {
        origin: String,
        key: String,
        expected: &'static str,
    },

    #[error("{origin}: unknown theme key `{key}`")]
    UnknownKey { origin: String, key: String },

    #[error("--color expects key=value, got `{0}`")]
    MalformedOverride(String),

    #[error("unknown theme `{0}`, using dark")]
    UnknownPreset(String),
}

/// Fully resolved colors. Every kind has a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeMap {
    pub headings: [Color; HEADING_LEVELS],
    pub code: Color,
    pub bold: Color,
    pub italic: Color,
    pub link: Color,
    pub list: Color,
}

impl Default for ThemeMap {
    fn default() -> Self {
        Preset::default().theme()
    }
}

impl ThemeMap {
    pub fn resolve(&self, kind: ElementKind) -> Color {
        match kind {
            ElementKind::Heading(level) => self.heading(level),
            ElementKind::Bold => self.bold,
            ElementKind::Italic => self.italic,
            ElementKind::Code => self.code,
            ElementKind::Link => self.link,
            ElementKind::List => self.list,
        }
    }

    /// Heading color, with the level clamped to 1..=6
    pub fn heading(&self, level: u8) -> Color {
        let idx = (level.max(1) as usize - 1).min(HEADING_LEVELS - 1);
        self.headings[idx]
    }

    /// Overlay the values a layer sets
    pub fn apply(&mut self, layer: &ThemeLayer) {
        for (slot, value) in self.headings.iter_mut().zip(layer.headings.iter()) {
            if let Some(color) = value {
                *slot = *color;
            }
        }
        let pairs = [
            (&mut self.code, layer.code),
            (&mut self.bold, layer.bold),
            (&mut self.italic, layer.italic),
            (&mut self.link, layer.link),
            (&mut self.list, layer.list),
        ];
        for (slot, value) in pairs {
            if let Some(color) = value {
                *slot = color;
            }
        }
    }
}

/// A partial theme from one configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeLayer {
    pub headings: [Option<Color>; HEADING_LEVELS],
    pub code: Option<Color>,
    pub bold: Option<Color>,
    pub italic: Option<Color>,
    pub link: Option<Color>,
    pub list: Option<Color>,
}

impl ThemeLayer {
    /// Read a theme-file object. Unknown keys are ignored.
    pub fn from_json(value: &Value, origin: &str) -> (Self, Vec<ThemeWarning>) {
        let mut layer = Self::default();
        let mut warnings = Vec::new();
        let Some(object) = value.as_object() else {
            return (layer, warnings);
        };

        for key in THEME_KEYS {
            let Some(entry) = object.get(key) else {
                continue;
            };
            match (key, entry) {
                (_, Value::String(token)) => layer.set(key, token, origin, &mut warnings),
                ("heading", Value::Array(items)) => {
                    for (idx, item) in items.iter().take(HEADING_LEVELS).enumerate() {
                        let color = match item {
                            Value::String(token) => parse_or_warn(token, key, origin, &mut warnings),
                            _ => {
                                warnings.push(ThemeWarning::WrongType {
                                    origin: origin.to_string(),
                                    key: format!("heading[{}]", idx),
                                    expected: "a color string",
                                });
                                DEFAULT_FOREGROUND
                            }
                        };
                        layer.headings[idx] = Some(color);
                    }
                }
                _ => {
                    warnings.push(ThemeWarning::WrongType {
                        origin: origin.to_string(),
                        key: key.to_string(),
                        expected: if key == "heading" {
                            "a color string or a list of colors"
                        } else {
                            "a color string"
                        },
                    });
                    layer.set_color(key, DEFAULT_FOREGROUND);
                }
            }
        }

        (layer, warnings)
    }

    /// Read `DRIZZLE_COLOR_<KEY>` variables through `lookup`
    pub fn from_env<F>(lookup: F) -> (Self, Vec<ThemeWarning>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layer = Self::default();
        let mut warnings = Vec::new();
        for key in THEME_KEYS {
            let var = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
            if let Some(value) = lookup(&var).filter(|v| !v.trim().is_empty()) {
                layer.set(key, &value, &var, &mut warnings);
            }
        }
        (layer, warnings)
    }

    /// Parse `key=value` command-line overrides
    pub fn from_assignments<I, S>(assignments: I) -> (Self, Vec<ThemeWarning>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut layer = Self::default();
        let mut warnings = Vec::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let Some((key, value)) = assignment.split_once('=') else {
                warnings.push(ThemeWarning::MalformedOverride(assignment.to_string()));
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            if !THEME_KEYS.contains(&key.as_str()) {
                warnings.push(ThemeWarning::UnknownKey {
                    origin: "--color".to_string(),
                    key,
                });
                continue;
            }
            layer.set(&key, value, "--color", &mut warnings);
        }
        (layer, warnings)
    }

    /// Set `key` from a text token. Headings accept a comma-separated list.
    fn set(&mut self, key: &str, token: &str, origin: &str, warnings: &mut Vec<ThemeWarning>) {
        if key == "heading" && token.contains(',') {
            for (idx, part) in token.split(',').take(HEADING_LEVELS).enumerate() {
                self.headings[idx] = Some(parse_or_warn(part, key, origin, warnings));
            }
            return;
        }
        let color = parse_or_warn(token, key, origin, warnings);
        self.set_color(key, color);
    }

    fn set_color(&mut self, key: &str, color: Color) {
        match key {
            "heading" => self.headings = [Some(color); HEADING_LEVELS],
            "code" => self.code = Some(color),
            "bold" => self.bold = Some(color),
            "italic" => self.italic = Some(color),
            "link" => self.link = Some(color),
            "list" => self.list = Some(color),
            _ => {}
        }
    }
}

fn parse_or_warn(token: &str, key: &str, origin: &str, warnings: &mut Vec<ThemeWarning>) -> Color {
    parse_color(token).unwrap_or_else(|| {
        warnings.push(ThemeWarning::InvalidColor {
            origin: origin.to_string(),
            key: key.to_string(),
            value: token.to_string(),
        });
        DEFAULT_FOREGROUND
    })
}

/// Parse a named color or `#RRGGBB`
pub fn parse_color(token: &str) -> Option<Color> {
    let token = token.trim();
    if let Some(hex) = token.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        return Some(rgb(value));
    }

    let name = token.to_ascii_lowercase().replace(['-', ' '], "_");
    let color = match name.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" | "purple" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "grey" | "gray" => Color::Grey,
        "dark_grey" | "dark_gray" | "darkgrey" | "darkgray" => Color::DarkGrey,
        "dark_red" => Color::DarkRed,
        "dark_green" => Color::DarkGreen,
        "dark_yellow" => Color::DarkYellow,
        "dark_blue" => Color::DarkBlue,
        "dark_magenta" => Color::DarkMagenta,
        "dark_cyan" => Color::DarkCyan,
        "default" | "reset" => Color::Reset,
        _ => return None,
    };
    Some(color)
}

/// `0xRRGGBB` to a truecolor value
pub const fn rgb(value: u32) -> Color {
    Color::Rgb {
        r: ((value >> 16) & 0xff) as u8,
        g: ((value >> 8) & 0xff) as u8,
        b: (value & 0xff) as u8,
    }
}
