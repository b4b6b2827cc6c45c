//! Configuration
//!
//! `StreamConfig` is built once at startup and passed by reference into every
//! component. `ConfigFile` is the optional on-disk layer it is merged from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::accumulator::ChunkPolicy;

/// Directory name under the platform config dir
const APP_DIR: &str = "drizzle";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_THEME_FILE: &str = "themes/default.json";

pub const DEFAULT_CHUNK_SIZE: usize = 150;
pub const DEFAULT_SPEED: Duration = Duration::from_millis(1);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);
pub const DEFAULT_WIDTH: usize = 80;

/// Immutable settings for one streaming run
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Byte ceiling before a flush is attempted
    pub chunk_size: usize,
    /// Pause after each rendered chunk (the live streaming effect)
    pub speed: Duration,
    /// Oldest pending byte may wait this long before a safe flush is forced
    pub flush_interval: Duration,
    /// How long the buffer may sit over `chunk_size` inside an open construct
    pub grace: Duration,
    /// Rewrite ASCII/Unicode boxed titles into headings
    pub strip_boxes: bool,
    /// Prepend the Markdown instruction to LLM queries
    pub inject: bool,
    /// Terminal columns, used for rules
    pub width: usize,
    /// Command that answers queries
    pub llm_cmd: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            speed: DEFAULT_SPEED,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            grace: DEFAULT_GRACE,
            strip_boxes: false,
            inject: true,
            width: DEFAULT_WIDTH,
            llm_cmd: None,
        }
    }
}

impl StreamConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            max_bytes: self.chunk_size.max(1),
            flush_interval: self.flush_interval,
            grace: self.grace,
        }
    }
}

/// Convert a fractional seconds value from flags or the config file
///
/// Negative, NaN, and overflowing values are rejected so a bad setting falls
/// back to the next layer instead of panicking in `Duration`.
pub fn seconds(value: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!(value, error = %e, "Ignoring invalid duration");
            None
        }
    }
}

/// `[llm]` table of the config file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Command used when no `--llm-cmd` is given
    #[serde(default)]
    pub command: Option<String>,
    /// Short names for frequently used commands
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// On-disk configuration (`<config_dir>/drizzle/config.toml`)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub flush_interval: Option<f64>,
    #[serde(default)]
    pub grace: Option<f64>,
    #[serde(default)]
    pub strip_boxes: Option<bool>,
    #[serde(default)]
    pub inject: Option<bool>,
    /// Built-in preset name
    #[serde(default)]
    pub theme: Option<String>,
    /// Theme file, relative to the config directory unless absolute
    #[serde(default)]
    pub theme_file: Option<String>,
    #[serde(default)]
    pub llm: LlmSection,
}

impl ConfigFile {
    /// `<config_dir>/drizzle`
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR))
    }

    /// Load from the default location. Absent, unreadable, or malformed files yield `None`.
    pub fn load() -> Option<Self> {
        let dir = Self::config_dir()?;
        Self::load_from(&dir.join(CONFIG_FILE))
    }

    /// Load from an explicit path, warning (not failing) on bad content
    pub fn load_from(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                return None;
            }
        };
        match Self::parse(&content) {
            Ok(config) => {
                debug!("Loaded config file {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the LLM command: alias lookup, then the literal request, then the default
    pub fn resolve_llm_cmd(&self, requested: Option<&str>) -> Option<String> {
        match requested {
            Some(name) => Some(
                self.llm
                    .aliases
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.to_string()),
            ),
            None => self.llm.command.clone(),
        }
    }

    /// Theme file named by the config, resolved against `config_dir`
    pub fn theme_file_path(&self, config_dir: &Path) -> Option<PathBuf> {
        self.theme_file.as_ref().map(|file| {
            let path = PathBuf::from(file);
            if path.is_absolute() {
                path
            } else {
                config_dir.join(path)
            }
        })
    }
}

/// `<config_dir>/themes/default.json` when it exists
pub fn default_theme_file(config_dir: &Path) -> Option<PathBuf> {
    let path = config_dir.join(DEFAULT_THEME_FILE);
    path.exists().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = ConfigFile::parse(
            r#"
speed = 0.05
chunk_size = 400
strip_boxes = true
theme = "light"
theme_file = "themes/ocean.json"

[llm]
command = "llm -m gpt-4o"

[llm.aliases]
claude = "claude -p"
"#,
        )
        .unwrap();

        assert_eq!(config.speed, Some(0.05));
        assert_eq!(config.chunk_size, Some(400));
        assert_eq!(config.strip_boxes, Some(true));
        assert_eq!(config.theme.as_deref(), Some("light"));
        assert_eq!(config.llm.aliases.get("claude").unwrap(), "claude -p");
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_resolve_llm_cmd() {
        let config = ConfigFile::parse(
            r#"
[llm]
command = "default-ai"
aliases = { fast = "fast-ai --quick" }
"#,
        )
        .unwrap();

        assert_eq!(
            config.resolve_llm_cmd(Some("fast")).as_deref(),
            Some("fast-ai --quick")
        );
        assert_eq!(
            config.resolve_llm_cmd(Some("other-ai")).as_deref(),
            Some("other-ai")
        );
        assert_eq!(config.resolve_llm_cmd(None).as_deref(), Some("default-ai"));
    }

    #[test]
    fn test_theme_file_relative_to_config_dir() {
        let config = ConfigFile {
            theme_file: Some("themes/mine.json".to_string()),
            ..Default::default()
        };
        let path = config.theme_file_path(Path::new("/home/u/.config/drizzle"));
        assert_eq!(
            path,
            Some(PathBuf::from("/home/u/.config/drizzle/themes/mine.json"))
        );
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "speed = [not valid").unwrap();
        assert!(ConfigFile::load_from(&path).is_none());
    }

    #[test]
    fn test_seconds_rejects_negative() {
        assert_eq!(seconds(0.5), Some(Duration::from_millis(500)));
        assert_eq!(seconds(-1.0), None);
        assert_eq!(seconds(f64::NAN), None);
    }

    #[test]
    fn test_policy_never_has_zero_ceiling() {
        let config = StreamConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(config.policy().max_bytes, 1);
    }
}
