//! Theme builder
//!
//! Layers are applied in call order, so callers add them from lowest to
//! highest priority: preset, file, environment, command line.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::{Preset, ThemeLayer, ThemeMap, ThemeWarning};
use crate::error::{Error, Result};

pub struct ThemeBuilder {
    theme: ThemeMap,
    warnings: Vec<ThemeWarning>,
}

impl ThemeBuilder {
    pub fn new(preset: Preset) -> Self {
        Self {
            theme: preset.theme(),
            warnings: Vec::new(),
        }
    }

    /// Start from a preset name; unknown names warn and use dark
    pub fn named(name: &str) -> Self {
        match name.parse::<Preset>() {
            Ok(preset) => Self::new(preset),
            Err(warning) => {
                let mut builder = Self::new(Preset::Dark);
                builder.warnings.push(warning);
                builder
            }
        }
    }

    /// Overlay a parsed layer and keep its warnings
    pub fn layer(mut self, (layer, warnings): (ThemeLayer, Vec<ThemeWarning>)) -> Self {
        self.theme.apply(&layer);
        self.warnings.extend(warnings);
        self
    }

    /// Overlay a theme file. Unreadable files and invalid JSON are fatal.
    pub fn theme_file(self, path: &Path) -> Result<Self> {
        Ok(self.layer(load_theme_file(path)?))
    }

    /// Overlay `DRIZZLE_COLOR_*` from the process environment
    pub fn env(self) -> Self {
        self.env_with(|var| std::env::var(var).ok())
    }

    pub fn env_with<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.layer(ThemeLayer::from_env(lookup))
    }

    /// Overlay `key=value` command-line overrides
    pub fn overrides<S: AsRef<str>>(self, assignments: &[S]) -> Self {
        self.layer(ThemeLayer::from_assignments(assignments))
    }

    /// Finish, returning the theme and each distinct warning once
    pub fn build_with_warnings(self) -> (ThemeMap, Vec<ThemeWarning>) {
        let mut unique: Vec<ThemeWarning> = Vec::with_capacity(self.warnings.len());
        for warning in self.warnings {
            if !unique.contains(&warning) {
                unique.push(warning);
            }
        }
        (self.theme, unique)
    }

    /// Finish, logging each distinct warning once
    pub fn build(self) -> ThemeMap {
        let (theme, warnings) = self.build_with_warnings();
        for warning in &warnings {
            warn!("{}", warning);
        }
        debug!(warnings = warnings.len(), "Theme resolved");
        theme
    }
}

impl Default for ThemeBuilder {
    fn default() -> Self {
        Self::new(Preset::default())
    }
}

/// Read a theme file into a layer
pub fn load_theme_file(path: &Path) -> Result<(ThemeLayer, Vec<ThemeWarning>)> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ThemeFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| Error::ThemeFileParse {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(Error::ThemeFileShape {
            path: path.to_path_buf(),
        });
    }
    debug!("Loaded theme file {}", path.display());
    let origin = format!("theme file {}", path.display());
    Ok(ThemeLayer::from_json(&value, &origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::style::Color;

    fn write_theme(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn test_partial_heading_array_keeps_preset_levels() {
        let file = write_theme(r##"{"heading": ["#ff0000", "#00ff00"]}"##);
        let preset = Preset::Dark.theme();
        let theme = ThemeBuilder::new(Preset::Dark)
            .theme_file(file.path())
            .unwrap()
            .build();

        assert_eq!(theme.heading(1), Color::Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(theme.heading(2), Color::Rgb { r: 0, g: 255, b: 0 });
        for level in 3..=6 {
            assert_eq!(theme.heading(level), preset.heading(level));
        }
        assert_eq!(theme.code, preset.code);
    }

    #[test]
    fn test_priority_order() {
        let file = write_theme(r#"{"code": "red", "bold": "red", "link": "red"}"#);
        let theme = ThemeBuilder::new(Preset::Light)
            .theme_file(file.path())
            .unwrap()
            .env_with(|var| (var == "DRIZZLE_COLOR_BOLD").then(|| "green".to_string()))
            .overrides(&["bold=blue", "link=yellow"])
            .build();

        assert_eq!(theme.code, Color::Red);
        assert_eq!(theme.bold, Color::Blue);
        assert_eq!(theme.link, Color::Yellow);
        assert_eq!(theme.list, Preset::Light.theme().list);
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let file = write_theme("{ heading: ");
        let err = ThemeBuilder::default().theme_file(file.path()).err().unwrap();
        assert!(matches!(err, Error::ThemeFileParse { .. }));
    }

    #[test]
    fn test_non_object_is_fatal() {
        let file = write_theme("[1, 2]");
        let err = ThemeBuilder::default().theme_file(file.path()).err().unwrap();
        assert!(matches!(err, Error::ThemeFileShape { .. }));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = ThemeBuilder::default()
            .theme_file(Path::new("/nonexistent/drizzle/theme.json"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::ThemeFileRead { .. }));
    }

    #[test]
    fn test_warnings_are_deduplicated() {
        let (_, warnings) = ThemeBuilder::named("neon")
            .overrides(&["code=bogus", "code=bogus"])
            .build_with_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], ThemeWarning::UnknownPreset(_)));
    }

    #[test]
    fn test_unknown_preset_falls_back_to_dark() {
        let (theme, _) = ThemeBuilder::named("neon").build_with_warnings();
        assert_eq!(theme, Preset::Dark.theme());
    }
}
