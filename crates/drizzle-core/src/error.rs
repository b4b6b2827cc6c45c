//! Error types for the streaming pipeline

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where a byte stream comes from. Carried by source errors so the
/// failing origin is always named in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),
    Command(String),
    Query(String),
    Stdin,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "file {}", path.display()),
            Origin::Command(cmd) => write!(f, "command `{}`", cmd),
            Origin::Query(cmd) => write!(f, "LLM command `{}`", cmd),
            Origin::Stdin => write!(f, "standard input"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {origin}: {source}")]
    Open {
        origin: Origin,
        #[source]
        source: io::Error,
    },

    #[error("failed to read from {origin}: {source}")]
    Read {
        origin: Origin,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {origin}: {source}")]
    Spawn {
        origin: Origin,
        #[source]
        source: io::Error,
    },

    #[error("{origin} exited with {status}")]
    CommandFailed { origin: Origin, status: ExitStatus },

    #[error("no LLM command configured; pass --llm-cmd or set [llm].command in the config file")]
    MissingLlmCommand,

    #[error("LLM command is empty or has unbalanced quotes: `{0}`")]
    InvalidLlmCommand(String),

    #[error("failed to read theme file {}: {source}", path.display())]
    ThemeFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("theme file {} is not valid JSON: {source}", path.display())]
    ThemeFileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("theme file {} must contain a JSON object", path.display())]
    ThemeFileShape { path: PathBuf },

    #[error("failed to write to terminal: {0}")]
    Output(#[source] io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// True when the failure came from the byte source rather than theme or output.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::Open { .. }
                | Error::Read { .. }
                | Error::Spawn { .. }
                | Error::CommandFailed { .. }
                | Error::MissingLlmCommand
                | Error::InvalidLlmCommand(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_name_their_origin() {
        let err = Error::Open {
            origin: Origin::File(PathBuf::from("/tmp/missing.md")),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/missing.md"), "{}", message);
        assert!(err.is_source_error());
    }

    #[test]
    fn test_output_error_is_not_a_source_error() {
        let err = Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(!err.is_source_error());
        assert!(err.to_string().contains("terminal"));
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::Stdin.to_string(), "standard input");
        assert_eq!(
            Origin::Command("ls -la".to_string()).to_string(),
            "command `ls -la`"
        );
    }
}
