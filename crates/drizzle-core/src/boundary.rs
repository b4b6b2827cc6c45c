//! Structural boundary detection
//!
//! Scans the pending buffer line by line and tracks whether the tail sits in a
//! code fence, a table, or plain text. Only complete lines are classified; the
//! detector remembers how far it got so each byte is examined once.

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;

/// Table delimiter row, e.g. `|---|:--:|` or `a | b` style `--|--`
static DELIMITER_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").unwrap());

/// An open code fence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// `` ` `` or `~`
    pub marker: u8,
    pub len: usize,
    /// Info string after the opening marker (language hint)
    pub info: String,
}

impl Fence {
    /// Parse an opening fence line (up to three spaces of indentation)
    pub fn open(line: &str) -> Option<Self> {
        let indent = leading_spaces(line);
        if indent > 3 {
            return None;
        }
        let rest = &line[indent..];
        let marker = *rest.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = rest.bytes().take_while(|&b| b == marker).count();
        if len < 3 {
            return None;
        }
        let info = rest[len..].trim();
        // Backtick fences cannot carry backticks in their info string
        if marker == b'`' && info.contains('`') {
            return None;
        }
        Some(Self {
            marker,
            len,
            info: info.to_string(),
        })
    }

    /// Does `line` close this fence?
    pub fn closes(&self, line: &str) -> bool {
        let indent = leading_spaces(line);
        if indent > 3 {
            return false;
        }
        let rest = &line[indent..];
        let run = rest.bytes().take_while(|&b| b == self.marker).count();
        run >= self.len && rest[run..].trim().is_empty()
    }

    /// Opening line that re-establishes this fence
    pub fn opener(&self) -> String {
        let marker = (self.marker as char).to_string().repeat(self.len);
        format!("{}{}\n", marker, self.info)
    }
}

/// Structural context at a position in the stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StructuralState {
    #[default]
    Plain,
    InFence(Fence),
    InTable,
}

impl StructuralState {
    pub fn is_plain(&self) -> bool {
        matches!(self, StructuralState::Plain)
    }

    pub fn fence(&self) -> Option<&Fence> {
        match self {
            StructuralState::InFence(fence) => Some(fence),
            _ => None,
        }
    }
}

/// Result of scanning the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryScan {
    /// State at the end of the last complete line
    pub state: StructuralState,
    /// Latest offset where a cut is safe, if any
    pub safe_point: Option<usize>,
}

/// Kind of a classified line in plain context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Heading,
    Rule,
    FenceOpen,
    TableRow,
    Delimiter,
    ListItem,
    Quote,
    Text,
}

#[derive(Debug, Default)]
pub struct BoundaryDetector {
    /// State at the end of the scanned region
    state: StructuralState,
    /// State at offset 0 of the buffer
    head_state: StructuralState,
    /// Bytes of complete lines already classified
    scanned: usize,
    /// Safe cut offsets in ascending order
    safe: VecDeque<usize>,
    /// Buffer starts mid-line (after a forced cut inside a line)
    carry: bool,
    prev: Option<LineKind>,
}

impl BoundaryDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StructuralState {
        &self.state
    }

    /// State the buffer starts in. A fence here means the buffer continues a code block.
    pub fn head_state(&self) -> &StructuralState {
        &self.head_state
    }

    /// Latest safe cut offset
    pub fn safe_point(&self) -> Option<usize> {
        self.safe.back().copied()
    }

    /// Where to cut for a chunk of at most `max_bytes`: the latest safe
    /// offset that fits, else the earliest one past the limit.
    pub fn cut_point(&self, max_bytes: usize) -> Option<usize> {
        let fits = self.safe.partition_point(|&at| at <= max_bytes);
        match fits {
            0 => self.safe.front().copied(),
            n => self.safe.get(n - 1).copied(),
        }
    }

    /// End of the last complete line
    pub fn last_line_end(&self) -> usize {
        self.scanned
    }

    /// Classify any complete lines added since the previous scan
    pub fn scan(&mut self, buf: &[u8]) -> BoundaryScan {
        while let Some(pos) = buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let start = self.scanned;
            let end = start + pos + 1;
            let raw = String::from_utf8_lossy(&buf[start..end]);
            let line = raw.trim_end_matches(['\n', '\r']);
            self.process_line(start, end, line);
            self.scanned = end;
        }

        BoundaryScan {
            state: self.state.clone(),
            safe_point: self.safe_point(),
        }
    }

    /// Account for `cut` bytes drained from the front of the buffer
    pub fn rebase(&mut self, cut: usize) {
        if cut >= self.scanned {
            self.head_state = self.state.clone();
            self.carry = cut > self.scanned;
            self.scanned = 0;
        } else {
            // Cuts before the scan frontier only happen at safe points
            self.head_state = StructuralState::Plain;
            self.carry = false;
            self.scanned -= cut;
        }
        self.safe.retain(|&at| at > cut);
        for at in self.safe.iter_mut() {
            *at -= cut;
        }
    }

    fn process_line(&mut self, start: usize, end: usize, line: &str) {
        if std::mem::take(&mut self.carry) {
            self.prev = Some(LineKind::Text);
            return;
        }

        match &self.state {
            StructuralState::InFence(fence) => {
                if fence.closes(line) {
                    self.state = StructuralState::Plain;
                    self.mark_safe(end);
                    self.prev = None;
                }
                return;
            }
            StructuralState::InTable => {
                if !line.trim().is_empty() && line.contains('|') {
                    return;
                }
                // Table over; the line itself is plain content
                self.state = StructuralState::Plain;
                self.prev = Some(LineKind::TableRow);
            }
            StructuralState::Plain => {}
        }

        self.plain_line(start, end, line);
    }

    fn plain_line(&mut self, start: usize, end: usize, line: &str) {
        let kind = classify(line);
        let starts_block = leading_spaces(line) < 2;

        match kind {
            LineKind::Blank | LineKind::Rule => self.mark_safe(end),
            LineKind::Heading => {
                if starts_block {
                    self.mark_safe(start);
                }
                self.mark_safe(end);
            }
            LineKind::FenceOpen => {
                if starts_block {
                    self.mark_safe(start);
                }
                if let Some(fence) = Fence::open(line) {
                    self.state = StructuralState::InFence(fence);
                }
            }
            LineKind::TableRow => {
                if starts_block {
                    self.mark_safe(start);
                }
                self.state = StructuralState::InTable;
            }
            // Header row had no leading pipe; the table starts one line up
            LineKind::Delimiter => self.state = StructuralState::InTable,
            LineKind::ListItem => {
                if starts_block {
                    self.mark_safe(start);
                }
            }
            LineKind::Quote => {
                if starts_block && self.prev != Some(LineKind::Quote) {
                    self.mark_safe(start);
                }
            }
            LineKind::Text => {}
        }
        self.prev = Some(kind);
    }

    fn mark_safe(&mut self, pos: usize) {
        if pos > 0 && !matches!(self.safe.back(), Some(&last) if last >= pos) {
            self.safe.push_back(pos);
        }
    }
}

fn leading_spaces(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ').count()
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if Fence::open(line).is_some() {
        return LineKind::FenceOpen;
    }
    if is_atx_heading(trimmed) {
        return LineKind::Heading;
    }
    if is_rule(trimmed) {
        return LineKind::Rule;
    }
    if line.contains('|') && DELIMITER_ROW.is_match(line) {
        return LineKind::Delimiter;
    }
    if trimmed.starts_with('|') {
        return LineKind::TableRow;
    }
    if trimmed.starts_with('>') {
        return LineKind::Quote;
    }
    if is_list_item(trimmed) {
        return LineKind::ListItem;
    }
    LineKind::Text
}

fn is_atx_heading(trimmed: &str) -> bool {
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .map_or(true, |c| c == ' ' || c == '\t')
}

/// `***` or `___` rules. `---` is left out since it doubles as a setext underline.
fn is_rule(trimmed: &str) -> bool {
    let compact: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && (compact.iter().all(|&c| c == '*') || compact.iter().all(|&c| c == '_'))
}

fn is_list_item(trimmed: &str) -> bool {
    let bytes = trimmed.as_bytes();
    match bytes.first() {
        Some(b'-' | b'*' | b'+') => matches!(bytes.get(1), Some(b' ' | b'\t') | None),
        Some(b'0'..=b'9') => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            digits <= 9
                && matches!(bytes.get(digits), Some(b'.' | b')'))
                && matches!(bytes.get(digits + 1), Some(b' ' | b'\t') | None)
        }
        _ => false,
    }
}
