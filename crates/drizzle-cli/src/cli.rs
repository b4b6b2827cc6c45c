//! Command-line arguments and their merge with the config file

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser};
use drizzle_core::config::{default_theme_file, seconds};
use drizzle_core::theme::ThemeBuilder;
use drizzle_core::{ConfigFile, StreamConfig, ThemeMap};

#[derive(Parser, Debug)]
#[command(name = "drizzle", version, about = "Stream Markdown to the terminal as it arrives")]
#[command(group = ArgGroup::new("input").args(["query", "file", "cmd"]).multiple(false))]
pub struct Cli {
    /// Question for the LLM command; words are joined with spaces
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Render a Markdown file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Render the output of a shell command
    #[arg(short, long, value_name = "COMMAND")]
    pub cmd: Option<String>,

    /// Render standard input (overrides every other input)
    #[arg(long)]
    pub stdin: bool,

    /// Seconds to pause after each chunk
    #[arg(long, value_name = "SECONDS")]
    pub speed: Option<f64>,

    /// Bytes to buffer before looking for a place to flush
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Seconds buffered text may wait before it is flushed anyway
    #[arg(long, value_name = "SECONDS")]
    pub flush_interval: Option<f64>,

    /// Seconds an oversized block may stay open before it is cut
    #[arg(long, value_name = "SECONDS")]
    pub grace: Option<f64>,

    /// Turn boxed titles into headings
    #[arg(long)]
    pub strip_boxes: bool,

    /// LLM command line, or an alias from the config file
    #[arg(long, value_name = "COMMAND")]
    pub llm_cmd: Option<String>,

    /// Built-in theme: dark, light, or mono
    #[arg(long)]
    pub theme: Option<String>,

    /// JSON theme file
    #[arg(long, value_name = "PATH")]
    pub theme_file: Option<PathBuf>,

    /// Do not ask the LLM to respond in Markdown
    #[arg(long)]
    pub no_inject: bool,

    /// Color override, e.g. `--color heading=#ff0000` (repeatable)
    #[arg(long = "color", value_name = "KEY=VALUE")]
    pub colors: Vec<String>,

    /// Increase verbosity (-v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Where the bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Query(String),
    File(PathBuf),
    Command(String),
    Stdin,
}

impl Cli {
    /// Pick the input. Piped stdin is used when nothing else is named.
    pub fn mode(&self, stdin_is_tty: bool) -> Result<Mode> {
        if self.stdin {
            return Ok(Mode::Stdin);
        }
        if !self.query.is_empty() {
            return Ok(Mode::Query(self.query.join(" ")));
        }
        if let Some(path) = &self.file {
            return Ok(Mode::File(path.clone()));
        }
        if let Some(cmd) = &self.cmd {
            return Ok(Mode::Command(cmd.clone()));
        }
        if !stdin_is_tty {
            return Ok(Mode::Stdin);
        }
        bail!("nothing to render: pass a query, --file, --cmd, or pipe text to stdin")
    }

    /// Merge flags over the config file over defaults
    pub fn stream_config(&self, file: &ConfigFile, width: usize) -> StreamConfig {
        let defaults = StreamConfig::default();
        let duration = |flag: Option<f64>, configured: Option<f64>, default| {
            flag.and_then(seconds)
                .or_else(|| configured.and_then(seconds))
                .unwrap_or(default)
        };

        StreamConfig {
            chunk_size: self
                .chunk_size
                .or(file.chunk_size)
                .unwrap_or(defaults.chunk_size),
            speed: duration(self.speed, file.speed, defaults.speed),
            flush_interval: duration(self.flush_interval, file.flush_interval, defaults.flush_interval),
            grace: duration(self.grace, file.grace, defaults.grace),
            strip_boxes: self.strip_boxes || file.strip_boxes.unwrap_or(defaults.strip_boxes),
            inject: !self.no_inject && file.inject.unwrap_or(defaults.inject),
            width,
            llm_cmd: file.resolve_llm_cmd(self.llm_cmd.as_deref()),
        }
    }

    /// Build the theme: preset, then theme file, then environment, then `--color`
    pub fn theme(&self, file: &ConfigFile, config_dir: Option<&Path>) -> drizzle_core::Result<ThemeMap> {
        let mut builder = match self.theme.as_deref().or(file.theme.as_deref()) {
            Some(name) => ThemeBuilder::named(name),
            None => ThemeBuilder::default(),
        };
        if let Some(path) = self.theme_file_path(file, config_dir) {
            builder = builder.theme_file(&path)?;
        }
        Ok(builder.env().overrides(self.colors.as_slice()).build())
    }

    fn theme_file_path(&self, file: &ConfigFile, config_dir: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = &self.theme_file {
            return Some(path.clone());
        }
        let dir = config_dir?;
        file.theme_file_path(dir).or_else(|| default_theme_file(dir))
    }
}
