//! The streaming loop
//!
//! One run reads a source to its end, cutting the stream into chunks and
//! rendering each in order. Reading, timer deadlines, and cancellation are
//! multiplexed with `select!`, so the time-based flush fires even while the
//! source is stalled.

use std::io::Write;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::accumulator::{Accumulator, Chunk};
use crate::boxes::BoxStripper;
use crate::cancel::StreamCancellation;
use crate::config::StreamConfig;
use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::source::ByteSource;
use crate::theme::ThemeMap;

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Bytes read from the source
    pub bytes_in: usize,
    pub chunks: usize,
    /// Chunks cut by the grace period inside an open construct
    pub forced_cuts: usize,
    /// Bytes written to the terminal
    pub bytes_out: usize,
}

/// Stream `source` to `out` until end of stream, failure, or cancellation.
///
/// On failure or cancellation the source is terminated and terminal styling
/// is reset, unless writing to `out` is what failed.
pub async fn run<S, W>(
    source: &mut S,
    config: &StreamConfig,
    theme: ThemeMap,
    out: W,
    cancel: &StreamCancellation,
) -> Result<StreamSummary>
where
    S: ByteSource + ?Sized,
    W: Write,
{
    info!(
        origin = %source.origin(),
        chunk_size = config.chunk_size,
        speed_ms = config.speed.as_millis() as u64,
        strip_boxes = config.strip_boxes,
        "Streaming"
    );

    let mut emitter = Emitter::new(out, Renderer::new(theme, config.width), config.speed);
    let mut summary = StreamSummary::default();

    match pump(source, config, &mut emitter, cancel, &mut summary).await {
        Ok(()) => {
            summary.bytes_out = emitter.bytes_written();
            info!(
                bytes_in = summary.bytes_in,
                chunks = summary.chunks,
                forced = summary.forced_cuts,
                "Stream complete"
            );
            Ok(summary)
        }
        Err(e) => {
            debug!("Stream stopped: {}", e);
            match &e {
                Error::CommandFailed { .. } => {}
                _ => source.terminate().await,
            }
            if !matches!(e, Error::Output(_)) {
                if let Err(reset) = emitter.reset_style() {
                    warn!("Failed to reset terminal style: {}", reset);
                }
            }
            Err(e)
        }
    }
}

async fn pump<S, W>(
    source: &mut S,
    config: &StreamConfig,
    emitter: &mut Emitter<W>,
    cancel: &StreamCancellation,
    summary: &mut StreamSummary,
) -> Result<()>
where
    S: ByteSource + ?Sized,
    W: Write,
{
    let mut acc = Accumulator::new(config.policy());
    let mut stripper = config.strip_boxes.then(BoxStripper::new);
    // Deadline that already fired without producing a chunk
    let mut spent: Option<std::time::Instant> = None;

    loop {
        let deadline = acc.next_deadline().filter(|&at| Some(at) != spent);

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Interrupted),
            _ = wait_until(deadline) => {
                let chunks = acc.poll(now());
                if chunks.is_empty() {
                    spent = deadline;
                }
                chunks
            }
            read = source.next_chunk() => match read? {
                Some(bytes) => {
                    summary.bytes_in += bytes.len();
                    spent = None;
                    match stripper.as_mut() {
                        Some(stripper) => acc.feed_at(&stripper.push(&bytes), now()),
                        None => acc.feed_at(&bytes, now()),
                    }
                }
                None => break,
            },
        };

        for chunk in &ready {
            emit(emitter, chunk, cancel, summary).await?;
        }
    }

    debug!(pending = acc.pending_len(), "End of stream");
    let tail = stripper.as_mut().map(BoxStripper::finish).unwrap_or_default();
    let mut ready = acc.feed_at(&tail, now());
    ready.extend(acc.finalize());
    for chunk in &ready {
        emit(emitter, chunk, cancel, summary).await?;
    }

    source.finish().await
}

async fn emit<W: Write>(
    emitter: &mut Emitter<W>,
    chunk: &Chunk,
    cancel: &StreamCancellation,
    summary: &mut StreamSummary,
) -> Result<()> {
    // The emitter writes only after its pacing wait, so cancelling during
    // the wait never splits an escape sequence.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Interrupted),
        result = emitter.emit(chunk) => result?,
    }
    summary.chunks += 1;
    if chunk.forced {
        summary.forced_cuts += 1;
    }
    Ok(())
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => sleep_until(Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Accumulator clock; follows tokio's clock so paused-time tests work
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
