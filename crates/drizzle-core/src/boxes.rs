//! Boxed title rewriting
//!
//! Turns three-line boxes such as
//!
//! ```text
//! ┌──────────┐
//! │ Overview │
//! └──────────┘
//! ```
//!
//! into `### Overview`. Works on the live stream with a look-back window of at
//! most three lines, so it runs before the accumulator for every source kind.
//! Anything that is not clearly a box passes through byte for byte, and
//! fenced code blocks are never touched.

use std::collections::VecDeque;

use crate::boundary::Fence;

const TOP_CORNERS_LEFT: &str = "┌┏╔╭+";
const TOP_CORNERS_RIGHT: &str = "┐┓╗╮+";
const BOTTOM_CORNERS_LEFT: &str = "└┗╚╰+";
const BOTTOM_CORNERS_RIGHT: &str = "┘┛╝╯+";
const HORIZONTALS: &str = "─━═-=+";
const VERTICALS: &str = "│┃║|";

/// Longest line that can still take part in a box
const MAX_BOX_LINE: usize = 256;

/// What to do with a completed line
enum Step {
    /// Keep in the window, with the title when this is the middle line
    Hold(Option<String>),
    Close,
    Write,
    Retry,
}

/// Streaming box stripper
#[derive(Debug)]
pub struct BoxStripper {
    /// Complete lines held back while a box may be forming
    window: VecDeque<Vec<u8>>,
    /// Title of the box in the window, once its middle line is seen
    title: Option<String>,
    /// Incomplete trailing line
    partial: Vec<u8>,
    /// Current line was already released; copy bytes up to the next newline
    passthrough: bool,
    /// Start of the released line, kept to recognise fence lines
    echoed: Vec<u8>,
    /// Open code fence in the output so far
    fence: Option<Fence>,
    /// Last completed output line was blank
    last_blank: bool,
    line_has_text: bool,
}

impl Default for BoxStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxStripper {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(3),
            title: None,
            partial: Vec::new(),
            passthrough: false,
            echoed: Vec::new(),
            fence: None,
            last_blank: true,
            line_has_text: false,
        }
    }

    /// Feed bytes, returning everything that can no longer be part of a box
    pub fn push(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut rest = bytes;

        while !rest.is_empty() {
            let newline = rest.iter().position(|&b| b == b'\n');
            let (head, tail) = match newline {
                Some(i) => rest.split_at(i + 1),
                None => (rest, &rest[rest.len()..]),
            };
            rest = tail;

            if self.passthrough {
                self.write(&mut out, head);
                let room = MAX_BOX_LINE.saturating_sub(self.echoed.len());
                self.echoed.extend(head.iter().take(room));
                if newline.is_some() {
                    self.passthrough = false;
                    let echoed = std::mem::take(&mut self.echoed);
                    self.track_fence(&echoed);
                }
                continue;
            }

            self.partial.extend_from_slice(head);
            if newline.is_some() {
                let line = std::mem::take(&mut self.partial);
                self.line(line, &mut out);
            }
        }

        // A partial line that cannot belong to a box need not wait for its newline
        if !self.partial.is_empty() {
            let too_long = self.partial.len() > MAX_BOX_LINE;
            let plain = self.fence.is_some() || !may_open_box(&self.partial);
            if too_long || (self.window.is_empty() && plain) {
                self.release(&mut out);
                let partial = std::mem::take(&mut self.partial);
                self.write(&mut out, &partial);
                self.echoed = partial;
                self.echoed.truncate(MAX_BOX_LINE);
                self.passthrough = true;
            }
        }

        out
    }

    /// Flush held lines at end of stream
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.line(line, &mut out);
        }
        self.release(&mut out);
        self.passthrough = false;
        self.echoed.clear();
        out
    }

    fn line(&mut self, line: Vec<u8>, out: &mut Vec<u8>) {
        let text = std::str::from_utf8(&line)
            .ok()
            .map(|s| s.trim_end_matches(['\n', '\r']).trim())
            .filter(|_| line.len() <= MAX_BOX_LINE);

        let step = match (self.window.len(), text) {
            (0, _) if self.fence.is_some() => Step::Write,
            (0, Some(t)) if is_top(t) => Step::Hold(None),
            (1, Some(t)) => title(t).map_or(Step::Retry, |inner| Step::Hold(Some(inner))),
            (2, Some(t)) if is_bottom(t) => Step::Close,
            (0, _) => Step::Write,
            _ => Step::Retry,
        };

        match step {
            Step::Hold(inner) => {
                if inner.is_some() {
                    self.title = inner;
                }
                self.window.push_back(line);
            }
            Step::Close => {
                self.window.clear();
                if let Some(inner) = self.title.take() {
                    if !self.last_blank {
                        out.push(b'\n');
                    }
                    out.extend_from_slice(format!("### {}\n\n", inner).as_bytes());
                    self.last_blank = true;
                }
            }
            Step::Write => {
                self.track_fence(&line);
                self.write(out, &line);
            }
            Step::Retry => self.retry(line, out),
        }
    }

    /// Window turned out not to be a box: release it and look at `line` afresh
    fn retry(&mut self, line: Vec<u8>, out: &mut Vec<u8>) {
        self.release(out);
        self.line(line, out);
    }

    fn track_fence(&mut self, line: &[u8]) {
        let Ok(text) = std::str::from_utf8(line) else {
            return;
        };
        let text = text.trim_end_matches(['\n', '\r']);
        match &self.fence {
            Some(fence) if fence.closes(text) => self.fence = None,
            Some(_) => {}
            None => self.fence = Fence::open(text),
        }
    }

    fn release(&mut self, out: &mut Vec<u8>) {
        self.title = None;
        while let Some(held) = self.window.pop_front() {
            self.write(out, &held);
        }
    }

    fn write(&mut self, out: &mut Vec<u8>, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                self.last_blank = !self.line_has_text;
                self.line_has_text = false;
            } else if !b.is_ascii_whitespace() {
                self.line_has_text = true;
            }
        }
        out.extend_from_slice(bytes);
    }
}

/// Rewrite boxes in a complete text
pub fn strip_boxes(text: &str) -> String {
    let mut stripper = BoxStripper::new();
    let mut out = stripper.push(text.as_bytes());
    out.extend(stripper.finish());
    String::from_utf8_lossy(&out).into_owned()
}

fn may_open_box(partial: &[u8]) -> bool {
    let lead = partial.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    let rest = &partial[lead..];
    match rest.first() {
        None | Some(b'+') => true,
        // Box drawing glyphs are three bytes starting with 0xE2
        Some(0xE2) if rest.len() < 3 => true,
        Some(0xE2) => std::str::from_utf8(&rest[..3])
            .ok()
            .and_then(|s| s.chars().next())
            .is_some_and(|c| TOP_CORNERS_LEFT.contains(c)),
        _ => false,
    }
}

fn is_border(line: &str, left: &str, right: &str) -> bool {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < 3 {
        return false;
    }
    let inner = &chars[1..chars.len() - 1];
    left.contains(chars[0])
        && right.contains(chars[chars.len() - 1])
        && inner.iter().all(|&c| HORIZONTALS.contains(c))
        && inner.iter().any(|&c| c != '+')
}

fn is_top(line: &str) -> bool {
    is_border(line, TOP_CORNERS_LEFT, TOP_CORNERS_RIGHT)
}

fn is_bottom(line: &str) -> bool {
    is_border(line, BOTTOM_CORNERS_LEFT, BOTTOM_CORNERS_RIGHT)
}

/// Text of a middle line `│ title │`, if it is one
fn title(line: &str) -> Option<String> {
    let mut chars = line.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if !VERTICALS.contains(first) || !VERTICALS.contains(last) {
        return None;
    }
    let inner = chars.as_str().trim();
    // More verticals means a table row or nested box
    if inner.is_empty() || inner.chars().any(|c| VERTICALS.contains(c)) {
        return None;
    }
    Some(inner.to_string())
}
