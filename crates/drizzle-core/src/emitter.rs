//! Terminal output and pacing

use std::io::Write;
use std::time::Duration;

use crossterm::queue;
use crossterm::style::{Attribute, ResetColor, SetAttribute};
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use crate::accumulator::Chunk;
use crate::error::{Error, Result};
use crate::render::Renderer;

/// Renders chunks to a writer, keeping at least `pace` between writes
pub struct Emitter<W: Write> {
    out: W,
    renderer: Renderer,
    pace: Duration,
    /// Earliest time the next chunk may be written
    next_at: Option<Instant>,
    chunks: usize,
    bytes: usize,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W, renderer: Renderer, pace: Duration) -> Self {
        Self {
            out,
            renderer,
            pace,
            next_at: None,
            chunks: 0,
            bytes: 0,
        }
    }

    /// Wait out the pacing delay left by the previous chunk, then render and
    /// write this one. Nothing is written after the last await, so dropping
    /// the future never leaves a partial write. The stream ends as soon as
    /// its last chunk is written.
    pub async fn emit(&mut self, chunk: &Chunk) -> Result<()> {
        if let Some(at) = self.next_at {
            sleep_until(at).await;
        }

        let event = self.renderer.render(chunk)?;
        if !event.is_empty() {
            self.out.write_all(event.as_bytes()).map_err(Error::Output)?;
            self.out.flush().map_err(Error::Output)?;
        }
        self.chunks += 1;
        self.bytes += event.len();
        trace!(
            chunk = self.chunks,
            input = chunk.len(),
            output = event.len(),
            forced = chunk.forced,
            last = chunk.is_final,
            "Emitted chunk"
        );

        if !self.pace.is_zero() {
            self.next_at = Some(Instant::now() + self.pace);
        }
        Ok(())
    }

    /// Return the terminal to default colors and attributes
    pub fn reset_style(&mut self) -> Result<()> {
        queue!(self.out, SetAttribute(Attribute::Reset), ResetColor).map_err(Error::Output)?;
        self.out.flush().map_err(Error::Output)
    }

    pub fn chunks_emitted(&self) -> usize {
        self.chunks
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeMap;

    fn chunk(text: &str, is_final: bool) -> Chunk {
        Chunk {
            bytes: text.as_bytes().to_vec(),
            resume: None,
            forced: false,
            is_final,
        }
    }

    fn emitter(pace: Duration) -> Emitter<Vec<u8>> {
        Emitter::new(Vec::new(), Renderer::new(ThemeMap::default(), 80), pace)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_chunks() {
        let mut emitter = emitter(Duration::from_millis(50));
        let start = Instant::now();
        emitter.emit(&chunk("one\n\n", false)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        emitter.emit(&chunk("two\n\n", false)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        emitter.emit(&chunk("three\n\n", true)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_is_not_paced_twice() {
        let mut emitter = emitter(Duration::from_millis(50));
        let start = Instant::now();
        emitter.emit(&chunk("one\n\n", false)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        emitter.emit(&chunk("two\n\n", false)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_chunk_is_not_paced() {
        let mut emitter = emitter(Duration::from_secs(1));
        let start = Instant::now();
        emitter.emit(&chunk("end", true)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(emitter.chunks_emitted(), 1);
        assert_eq!(emitter.get_ref().as_slice(), b"end\n");
    }

    #[tokio::test]
    async fn test_reset_style_writes_sgr_reset() {
        let mut emitter = emitter(Duration::ZERO);
        emitter.reset_style().unwrap();
        let out = String::from_utf8(emitter.into_inner()).unwrap();
        assert!(out.contains("\x1b[0m"), "{:?}", out);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_output_error() {
        let mut emitter = Emitter::new(
            BrokenPipe,
            Renderer::new(ThemeMap::default(), 80),
            Duration::ZERO,
        );
        let err = emitter.emit(&chunk("text\n", false)).await.unwrap_err();
        assert!(matches!(err, Error::Output(_)));
    }
}
