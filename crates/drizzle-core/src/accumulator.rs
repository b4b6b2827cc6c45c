//! Chunk accumulation
//!
//! Buffers incoming bytes and decides when a prefix of the buffer is ready to
//! render. Three triggers exist:
//! - size: the buffer reached `max_bytes`
//! - time: the oldest pending byte is older than `flush_interval`
//! - grace: the buffer has been over `max_bytes` with no safe point for `grace`
//!
//! Size and time cut at a safe point reported by the boundary detector,
//! preferring the latest one that keeps the chunk within `max_bytes`. A chunk
//! runs over the limit only when a single block is larger than it. Grace
//! forces a cut at the last line end as a last resort.
//! Bytes are never dropped or reordered.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::boundary::{BoundaryDetector, Fence};
use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_FLUSH_INTERVAL, DEFAULT_GRACE};

/// Flush thresholds. Both are always in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub max_bytes: usize,
    pub flush_interval: Duration,
    pub grace: Duration,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_CHUNK_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            grace: DEFAULT_GRACE,
        }
    }
}

/// A flush-ready slice of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub bytes: Vec<u8>,
    /// Code fence this chunk continues, when an earlier chunk was cut inside it
    pub resume: Option<Fence>,
    /// Cut by the grace period rather than at a safe point
    pub forced: bool,
    /// Remainder emitted when the source closed
    pub is_final: bool,
}

impl Chunk {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
pub struct Accumulator {
    policy: ChunkPolicy,
    pending: Vec<u8>,
    detector: BoundaryDetector,
    /// (end offset in `pending`, arrival time) per fed slice
    arrivals: VecDeque<(usize, Instant)>,
    /// When the buffer went over `max_bytes` without a safe point
    stuck_since: Option<Instant>,
}

impl Accumulator {
    pub fn new(policy: ChunkPolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
            detector: BoundaryDetector::new(),
            arrivals: VecDeque::new(),
            stuck_since: None,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append bytes and return any chunks that became ready
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Chunk> {
        self.feed_at(bytes, Instant::now())
    }

    /// `feed` with an explicit clock
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) -> Vec<Chunk> {
        if !bytes.is_empty() {
            self.pending.extend_from_slice(bytes);
            self.arrivals.push_back((self.pending.len(), now));
            self.detector.scan(&self.pending);
        }
        self.poll(now)
    }

    /// Re-check the time-based triggers without new input
    pub fn poll(&mut self, now: Instant) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.try_flush(now) {
            chunks.push(chunk);
        }
        chunks
    }

    /// Flush whatever remains. The stream is over so no cut has to be safe.
    pub fn finalize(&mut self) -> Option<Chunk> {
        if self.pending.is_empty() {
            return None;
        }
        let resume = self.detector.head_state().fence().cloned();
        let bytes = std::mem::take(&mut self.pending);
        self.detector = BoundaryDetector::new();
        self.arrivals.clear();
        self.stuck_since = None;
        debug!(bytes = bytes.len(), "Final chunk");
        Some(Chunk {
            bytes,
            resume,
            forced: false,
            is_final: true,
        })
    }

    /// Earliest instant at which `poll` could produce a chunk without new input
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        let timed = match (self.detector.safe_point(), self.pending_since()) {
            (Some(_), Some(since)) => Some(since + self.policy.flush_interval),
            _ => None,
        };
        let grace = self.stuck_since.map(|since| since + self.policy.grace);
        match (timed, grace) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Arrival time of the oldest pending byte
    fn pending_since(&self) -> Option<Instant> {
        self.arrivals.front().map(|&(_, at)| at)
    }

    fn try_flush(&mut self, now: Instant) -> Option<Chunk> {
        if self.pending.is_empty() {
            return None;
        }

        let over = self.pending.len() >= self.policy.max_bytes;
        let stale = self
            .pending_since()
            .is_some_and(|since| now.saturating_duration_since(since) >= self.policy.flush_interval);

        if let Some(at) = self.detector.cut_point(self.policy.max_bytes) {
            self.stuck_since = None;
            if over || stale {
                trace!(at, over, stale, "Cutting at safe point");
                return Some(self.cut(at, false));
            }
            return None;
        }

        if !over {
            self.stuck_since = None;
            return None;
        }

        let since = *self.stuck_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.policy.grace {
            return None;
        }

        let at = match self.detector.last_line_end() {
            0 => utf8_safe_len(&self.pending),
            end => end,
        };
        if at == 0 {
            return None;
        }
        debug!(
            at,
            pending = self.pending.len(),
            state = ?self.detector.state(),
            "Grace period elapsed, forcing cut"
        );
        Some(self.cut(at, true))
    }

    fn cut(&mut self, at: usize, forced: bool) -> Chunk {
        let resume = self.detector.head_state().fence().cloned();
        let bytes: Vec<u8> = self.pending.drain(..at).collect();
        self.detector.rebase(at);

        while self.arrivals.front().is_some_and(|&(end, _)| end <= at) {
            self.arrivals.pop_front();
        }
        for (end, _) in self.arrivals.iter_mut() {
            *end -= at;
        }
        self.stuck_since = None;

        Chunk {
            bytes,
            resume,
            forced,
            is_final: false,
        }
    }
}

/// Longest prefix of `buf` that does not end inside a UTF-8 sequence
fn utf8_safe_len(buf: &[u8]) -> usize {
    let len = buf.len();
    for back in 1..=len.min(3) {
        let byte = buf[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}
