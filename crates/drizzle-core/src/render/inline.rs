//! Inline content rendering to styled spans

use crossterm::style::Color;
use unicode_width::UnicodeWidthStr;

use super::elements::InlineContent;
use crate::theme::{ElementKind, ThemeMap};

/// Terminal attributes for one span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub fg: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub dim: bool,
}

impl SpanStyle {
    pub fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    /// Set the color unless an outer element already chose one
    pub fn fg_or(mut self, color: Color) -> Self {
        self.fg.get_or_insert(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn strike(mut self) -> Self {
        self.strike = true;
        self
    }

    pub fn dim(mut self) -> Self {
        self.dim = true;
        self
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }

    pub fn styled(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn width(&self) -> usize {
        UnicodeWidthStr::width(self.text.as_str())
    }
}

/// One output line
pub type Line = Vec<Span>;

pub fn line_width(line: &[Span]) -> usize {
    line.iter().map(Span::width).sum()
}

/// Render inline content to lines. Soft and hard breaks both end a line.
pub fn render_inline(content: &[InlineContent], theme: &ThemeMap, base: SpanStyle) -> Vec<Line> {
    let mut lines = vec![Vec::new()];
    for item in content {
        render_item(item, theme, base, &mut lines);
    }
    lines
}

fn render_item(item: &InlineContent, theme: &ThemeMap, style: SpanStyle, lines: &mut Vec<Line>) {
    match item {
        InlineContent::Text(text) => push(lines, Span::styled(text.clone(), style)),
        InlineContent::Bold(content) => {
            let style = style.bold().fg_or(theme.resolve(ElementKind::Bold));
            for inner in content {
                render_item(inner, theme, style, lines);
            }
        }
        InlineContent::Italic(content) => {
            let style = style.italic().fg_or(theme.resolve(ElementKind::Italic));
            for inner in content {
                render_item(inner, theme, style, lines);
            }
        }
        InlineContent::Strikethrough(content) => {
            let style = style.strike();
            for inner in content {
                render_item(inner, theme, style, lines);
            }
        }
        InlineContent::Code(code) => {
            let style = style.fg(theme.resolve(ElementKind::Code));
            push(lines, Span::styled(code.clone(), style))
        }
        InlineContent::Link { text, url } => {
            let link_style = style.fg(theme.resolve(ElementKind::Link)).underline();
            for inner in text {
                render_item(inner, theme, link_style, lines);
            }
            if plain_text(text) != *url {
                push(lines, Span::styled(format!(" ({})", url), SpanStyle::default().dim()));
            }
        }
        InlineContent::SoftBreak | InlineContent::HardBreak => lines.push(Vec::new()),
    }
}

fn push(lines: &mut Vec<Line>, span: Span) {
    if span.text.is_empty() {
        return;
    }
    match lines.last_mut() {
        Some(line) => line.push(span),
        None => lines.push(vec![span]),
    }
}

/// Text content without styling
pub fn plain_text(content: &[InlineContent]) -> String {
    let mut out = String::new();
    for item in content {
        match item {
            InlineContent::Text(text) | InlineContent::Code(text) => out.push_str(text),
            InlineContent::Bold(inner)
            | InlineContent::Italic(inner)
            | InlineContent::Strikethrough(inner)
            | InlineContent::Link { text: inner, .. } => out.push_str(&plain_text(inner)),
            InlineContent::SoftBreak | InlineContent::HardBreak => out.push(' '),
        }
    }
    out
}
