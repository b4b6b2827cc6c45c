//! Chunk rendering
//!
//! Each chunk is cleaned, parsed with pulldown-cmark, laid out as lines of
//! styled spans, and serialized to terminal escape sequences with crossterm.
//! Every styled span is closed with an attribute and color reset, so a
//! rendered chunk never leaves styling open.

use std::io;

use crossterm::queue;
use crossterm::style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor};
use unicode_width::UnicodeWidthStr;

pub mod elements;
pub mod inline;
pub mod parser;
pub mod sanitize;
pub mod table;

use crate::accumulator::Chunk;
use crate::error::{Error, Result};
use crate::theme::{ElementKind, ThemeMap};
use elements::{BlockKind, ListItem, MarkdownElement};
use inline::{render_inline, Line, Span, SpanStyle};

const CODE_INDENT: &str = "  ";
const QUOTE_PREFIX: &str = "│ ";
const BULLETS: [&str; 3] = ["•", "◦", "▪"];

/// Styled output for one chunk, ready for the terminal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderEvent {
    bytes: Vec<u8>,
}

impl RenderEvent {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Renders chunks in stream order, keeping just enough context to space
/// blocks consistently across chunk boundaries.
#[derive(Debug, Clone)]
pub struct Renderer {
    theme: ThemeMap,
    width: usize,
    prev: Option<BlockKind>,
}

impl Renderer {
    pub fn new(theme: ThemeMap, width: usize) -> Self {
        Self {
            theme,
            width: width.max(1),
            prev: None,
        }
    }

    pub fn render(&mut self, chunk: &Chunk) -> Result<RenderEvent> {
        let mut source = String::new();
        if let Some(fence) = &chunk.resume {
            source.push_str(&fence.opener());
        }
        source.push_str(&chunk.text());
        let source = sanitize::strip_ansi(&source);

        let elements = parser::parse(&source);
        let mut out = Vec::new();
        for (idx, element) in elements.iter().enumerate() {
            let kind = element.kind();
            let continues = idx == 0 && chunk.resume.is_some();
            let joined_list = self.prev == Some(BlockKind::List) && kind == BlockKind::List;
            if self.prev.is_some() && !continues && !joined_list {
                out.push(b'\n');
            }
            let lines = self.block_lines(element, 0);
            write_lines(&mut out, &lines).map_err(Error::Output)?;
            self.prev = Some(kind);
        }

        Ok(RenderEvent { bytes: out })
    }

    fn block_lines(&self, element: &MarkdownElement, depth: usize) -> Vec<Line> {
        let theme = &self.theme;
        match element {
            MarkdownElement::Paragraph(content) => {
                render_inline(content, theme, SpanStyle::default())
            }
            MarkdownElement::Heading { level, content } => {
                let style = SpanStyle::default()
                    .fg(theme.resolve(ElementKind::Heading(*level)))
                    .bold();
                render_inline(content, theme, style)
            }
            MarkdownElement::CodeBlock { code, .. } => {
                let style = SpanStyle::default().fg(theme.resolve(ElementKind::Code));
                code.lines()
                    .map(|line| vec![Span::raw(CODE_INDENT), Span::styled(line, style)])
                    .collect()
            }
            MarkdownElement::BlockQuote(inner) => {
                let prefix = Span::styled(QUOTE_PREFIX, SpanStyle::default().fg(theme.resolve(ElementKind::Italic)));
                self.blocks_lines(inner, depth, true)
                    .into_iter()
                    .map(|line| {
                        let mut prefixed = vec![prefix.clone()];
                        prefixed.extend(line);
                        prefixed
                    })
                    .collect()
            }
            MarkdownElement::List { start, items } => items
                .iter()
                .enumerate()
                .flat_map(|(idx, item)| {
                    let marker = match start {
                        Some(first) => format!("{}.", first + idx as u64),
                        None => BULLETS[depth % BULLETS.len()].to_string(),
                    };
                    self.item_lines(item, marker, depth)
                })
                .collect(),
            MarkdownElement::Table {
                alignments,
                headers,
                rows,
            } => table::render_table(alignments, headers, rows, theme),
            MarkdownElement::ThematicBreak => vec![vec![Span::styled(
                "─".repeat(self.width),
                SpanStyle::default().dim(),
            )]],
        }
    }

    fn blocks_lines(&self, elements: &[MarkdownElement], depth: usize, gaps: bool) -> Vec<Line> {
        let mut lines = Vec::new();
        for (idx, element) in elements.iter().enumerate() {
            if gaps && idx > 0 {
                lines.push(Vec::new());
            }
            lines.extend(self.block_lines(element, depth));
        }
        lines
    }

    fn item_lines(&self, item: &ListItem, marker: String, depth: usize) -> Vec<Line> {
        let list_style = SpanStyle::default().fg(self.theme.resolve(ElementKind::List));
        let mut head = vec![Span::styled(marker, list_style)];
        match item.checked {
            Some(true) => head.push(Span::styled(" [x]", list_style)),
            Some(false) => head.push(Span::styled(" [ ]", list_style)),
            None => {}
        }
        head.push(Span::raw(" "));
        let indent = " ".repeat(head.iter().map(Span::width).sum());

        let body = self.blocks_lines(&item.content, depth + 1, false);
        if body.is_empty() {
            return vec![head];
        }
        body.into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let mut prefixed = if idx == 0 {
                    head.clone()
                } else {
                    vec![Span::raw(indent.clone())]
                };
                prefixed.extend(line);
                prefixed
            })
            .collect()
    }
}

fn write_lines(out: &mut Vec<u8>, lines: &[Line]) -> io::Result<()> {
    for line in lines {
        for span in line {
            write_span(out, span)?;
        }
        out.push(b'\n');
    }
    Ok(())
}

fn write_span(out: &mut Vec<u8>, span: &Span) -> io::Result<()> {
    let style = span.style;
    if style.is_plain() {
        return queue!(out, Print(&span.text));
    }
    if let Some(color) = style.fg {
        queue!(out, SetForegroundColor(color))?;
    }
    let attributes = [
        (style.bold, Attribute::Bold),
        (style.italic, Attribute::Italic),
        (style.underline, Attribute::Underlined),
        (style.strike, Attribute::CrossedOut),
        (style.dim, Attribute::Dim),
    ];
    for (enabled, attribute) in attributes {
        if enabled {
            queue!(out, SetAttribute(attribute))?;
        }
    }
    queue!(out, Print(&span.text), SetAttribute(Attribute::Reset), ResetColor)
}

/// Display width of rendered output with escape sequences removed
pub fn visible_width(rendered: &str) -> usize {
    UnicodeWidthStr::width(sanitize::strip_ansi(rendered).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Fence;
    use crate::theme::Preset;
    use crossterm::style::Color;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            bytes: text.as_bytes().to_vec(),
            resume: None,
            forced: false,
            is_final: false,
        }
    }

    fn render_plain(renderer: &mut Renderer, text: &str) -> String {
        let event = renderer.render(&chunk(text)).unwrap();
        sanitize::strip_ansi(&String::from_utf8(event.into_bytes()).unwrap()).into_owned()
    }

    fn sgr_fg(color: crossterm::style::Color) -> String {
        let mut bytes = Vec::new();
        queue!(bytes, SetForegroundColor(color)).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_heading_then_paragraph() {
        let theme = Preset::Dark.theme();
        let mut renderer = Renderer::new(theme, 80);
        let event = renderer.render(&chunk("# Hello\n\nWorld")).unwrap();
        let out = String::from_utf8(event.into_bytes()).unwrap();

        let color = sgr_fg(theme.heading(1));
        let heading_at = out.find(&color).expect("heading color present");
        let hello_at = out.find("Hello").unwrap();
        assert!(heading_at < hello_at);
        assert!(out.find("World").unwrap() > hello_at);
        assert_eq!(sanitize::strip_ansi(&out), "Hello\n\nWorld\n");
    }

    #[test]
    fn test_every_styled_span_is_reset() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let event = renderer.render(&chunk("**bold** and `code`\n")).unwrap();
        let out = String::from_utf8(event.into_bytes()).unwrap();
        let mut reset = Vec::new();
        queue!(reset, SetAttribute(Attribute::Reset), ResetColor).unwrap();
        let reset = String::from_utf8(reset).unwrap();
        assert!(out.trim_end_matches('\n').ends_with(&reset), "{:?}", out);
        assert_eq!(out.matches(&reset).count(), 2);
    }

    #[test]
    fn test_lists_join_across_chunks() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let first = render_plain(&mut renderer, "- one\n");
        let second = render_plain(&mut renderer, "- two\n");
        assert_eq!(first, "• one\n");
        assert_eq!(second, "• two\n");

        let para = render_plain(&mut renderer, "after\n");
        assert_eq!(para, "\nafter\n");
    }

    #[test]
    fn test_ordered_and_nested_lists() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let out = render_plain(&mut renderer, "2. two\n3. three\n   - inner\n");
        assert_eq!(out, "2. two\n3. three\n   ◦ inner\n");
    }

    #[test]
    fn test_task_list() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let out = render_plain(&mut renderer, "- [x] done\n- [ ] todo\n");
        assert_eq!(out, "• [x] done\n• [ ] todo\n");
    }

    #[test]
    fn test_resumed_fence_continues_code_block() {
        let theme = Preset::Dark.theme();
        let mut renderer = Renderer::new(theme, 80);
        render_plain(&mut renderer, "```rust\nlet a = 1;\n");

        let resumed = Chunk {
            bytes: b"let b = 2;\n```\n".to_vec(),
            resume: Fence::open("```rust"),
            forced: false,
            is_final: false,
        };
        let event = renderer.render(&resumed).unwrap();
        let out = String::from_utf8(event.into_bytes()).unwrap();
        assert!(out.contains(&sgr_fg(theme.code)));
        assert_eq!(sanitize::strip_ansi(&out), "  let b = 2;\n");
    }

    #[test]
    fn test_blockquote_prefix() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let out = render_plain(&mut renderer, "> quoted\n");
        assert_eq!(out, "│ quoted\n");
    }

    #[test]
    fn test_rule_spans_width() {
        let mut renderer = Renderer::new(ThemeMap::default(), 12);
        let out = render_plain(&mut renderer, "***\n");
        assert_eq!(out, format!("{}\n", "─".repeat(12)));
    }

    #[test]
    fn test_math_and_ansi_are_cleaned() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let out = render_plain(&mut renderer, "\x1b[31mEnergy\x1b[0m: $$E = mc^2$$\n");
        assert_eq!(out, "Energy: [Math: E = mc^2]\n");
    }

    #[test]
    fn test_fenced_math_is_left_alone() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let out = render_plain(&mut renderer, "```\n$$x$$\n```\n\nsee $$x$$\n");
        assert_eq!(out, "  $$x$$\n\nsee [Math: x]\n");
    }

    #[test]
    fn test_custom_colors_reach_output() {
        let mut theme = ThemeMap::default();
        theme.bold = Color::Rgb { r: 1, g: 2, b: 3 };
        theme.list = Color::Rgb { r: 4, g: 5, b: 6 };
        theme.headings[1] = Color::Rgb { r: 7, g: 8, b: 9 };
        let mut renderer = Renderer::new(theme, 80);
        let event = renderer.render(&chunk("## Sub\n\n- **item**\n")).unwrap();
        let out = String::from_utf8(event.into_bytes()).unwrap();
        assert!(out.contains(&sgr_fg(Color::Rgb { r: 1, g: 2, b: 3 })), "{:?}", out);
        assert!(out.contains(&sgr_fg(Color::Rgb { r: 4, g: 5, b: 6 })), "{:?}", out);
        assert!(out.contains(&sgr_fg(Color::Rgb { r: 7, g: 8, b: 9 })), "{:?}", out);
    }

    #[test]
    fn test_whitespace_chunk_renders_nothing() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let event = renderer.render(&chunk("\n\n")).unwrap();
        assert!(event.is_empty());
    }

    #[test]
    fn test_visible_width_ignores_escapes() {
        let mut renderer = Renderer::new(ThemeMap::default(), 80);
        let event = renderer.render(&chunk("**日本**\n")).unwrap();
        let out = String::from_utf8(event.into_bytes()).unwrap();
        assert_eq!(visible_width(out.trim_end()), 4);
    }
}
