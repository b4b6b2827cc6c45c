//! Byte sources
//!
//! A source yields raw bytes in arrival order until end of stream. Sources
//! backed by a subprocess also report the exit status and can be killed when
//! the run is cancelled.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{Error, Origin, Result};

/// Bytes requested per read
const READ_BUFFER: usize = 8 * 1024;

#[async_trait]
pub trait ByteSource: Send {
    /// Next slice of the stream, `None` at end of stream
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Called once after end of stream; reports a failed producer
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stop producing. Called when the run is cancelled or fails.
    async fn terminate(&mut self) {}

    fn origin(&self) -> &Origin;
}

/// Any async reader: files, stdin, in-memory buffers
pub struct ReaderSource<R> {
    reader: R,
    origin: Origin,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R, origin: Origin) -> Self {
        Self {
            reader,
            origin,
            buf: BytesMut::with_capacity(READ_BUFFER),
        }
    }
}

impl ReaderSource<tokio::fs::File> {
    pub async fn open_file(path: &Path) -> Result<Self> {
        let origin = Origin::File(path.to_path_buf());
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| Error::Open {
                origin: origin.clone(),
                source,
            })?;
        debug!("Opened {}", origin);
        Ok(Self::new(file, origin))
    }
}

impl ReaderSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), Origin::Stdin)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.buf.reserve(READ_BUFFER);
        let read = self
            .reader
            .read_buf(&mut self.buf)
            .await
            .map_err(|source| Error::Read {
                origin: self.origin.clone(),
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }

    fn origin(&self) -> &Origin {
        &self.origin
    }
}

/// Standard output of a child process
pub struct CommandSource {
    child: Child,
    stdout: ReaderSource<ChildStdout>,
}

impl CommandSource {
    /// Run `cmd` through `sh -c`
    pub fn shell(cmd: &str) -> Result<Self> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        Self::spawn(command, Origin::Command(cmd.to_string()))
    }

    /// Run the LLM command with the prepared query as its last argument.
    ///
    /// The command line is split with shell quoting rules, so
    /// `llm -m "my model"` passes `my model` as one argument.
    pub fn query(llm_cmd: &str, query: &str) -> Result<Self> {
        let words = shell_words::split(llm_cmd)
            .map_err(|_| Error::InvalidLlmCommand(llm_cmd.to_string()))?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| Error::InvalidLlmCommand(llm_cmd.to_string()))?;

        let mut command = Command::new(program);
        command.args(args).arg(query);
        Self::spawn(command, Origin::Query(llm_cmd.to_string()))
    }

    fn spawn(mut command: Command, origin: Origin) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            origin: origin.clone(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
            origin: origin.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;
        info!(pid = ?child.id(), "Started {}", origin);

        Ok(Self {
            child,
            stdout: ReaderSource::new(stdout, origin),
        })
    }
}

#[async_trait]
impl ByteSource for CommandSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.stdout.next_chunk().await
    }

    async fn finish(&mut self) -> Result<()> {
        let status = self.child.wait().await.map_err(|source| Error::Read {
            origin: self.stdout.origin.clone(),
            source,
        })?;
        debug!(%status, "{} exited", self.stdout.origin);
        if status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                origin: self.stdout.origin.clone(),
                status,
            })
        }
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Kill of {} skipped: {}", self.stdout.origin, e);
        }
        if let Err(e) = self.child.wait().await {
            warn!("Failed to reap {}: {}", self.stdout.origin, e);
        }
    }

    fn origin(&self) -> &Origin {
        self.stdout.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(source: &mut dyn ByteSource) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(bytes) = source.next_chunk().await.unwrap() {
            out.extend_from_slice(&bytes);
        }
        out
    }

    #[tokio::test]
    async fn test_reader_source_yields_everything() {
        let text = "# Title\n\nbody\n".repeat(2000);
        let mut source = ReaderSource::new(text.as_bytes(), Origin::Stdin);
        assert_eq!(drain(&mut source).await, text.as_bytes());
        assert!(source.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.md");
        let err = match ReaderSource::open_file(&path).await {
            Ok(_) => panic!("opened a missing file"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Open { .. }));
        assert!(err.to_string().contains("missing.md"));
    }

    #[tokio::test]
    async fn test_file_source_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "hello\n").unwrap();
        let mut source = ReaderSource::open_file(&path).await.unwrap();
        assert_eq!(drain(&mut source).await, b"hello\n");
        assert_eq!(source.origin(), &Origin::File(path));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_command_stdout() {
        let mut source = CommandSource::shell("printf 'a\\nb'").unwrap();
        assert_eq!(drain(&mut source).await, b"a\nb");
        source.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let mut source = CommandSource::shell("echo partial; exit 3").unwrap();
        assert_eq!(drain(&mut source).await, b"partial\n");
        let err = source.finish().await.unwrap_err();
        match err {
            Error::CommandFailed { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_is_one_argument() {
        let mut source = CommandSource::query("printf '%s|'", "two words").unwrap();
        assert_eq!(drain(&mut source).await, b"two words|");
        source.finish().await.unwrap();
    }

    #[test]
    fn test_invalid_llm_command() {
        for cmd in ["", "   ", "llm \"unclosed"] {
            let err = match CommandSource::query(cmd, "q") {
                Ok(_) => panic!("accepted {:?}", cmd),
                Err(e) => e,
            };
            assert!(matches!(err, Error::InvalidLlmCommand(_)), "{:?}", cmd);
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = match CommandSource::query("drizzle-test-no-such-program", "q") {
            Ok(_) => panic!("spawned a missing program"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.to_string().contains("drizzle-test-no-such-program"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_child() {
        let mut source = CommandSource::shell("sleep 30").unwrap();
        source.terminate().await;
        let status = source.child.try_wait().unwrap();
        assert!(status.is_some());
    }
}
