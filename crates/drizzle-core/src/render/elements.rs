//! Parsed Markdown structure

use pulldown_cmark::Alignment;

/// Block-level elements
#[derive(Debug, Clone, PartialEq)]
pub enum MarkdownElement {
    Paragraph(Vec<InlineContent>),
    /// Level 1-6
    Heading {
        level: u8,
        content: Vec<InlineContent>,
    },
    CodeBlock {
        code: String,
    },
    BlockQuote(Vec<MarkdownElement>),
    List {
        /// First number of an ordered list, `None` for bullets
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Table {
        alignments: Vec<Alignment>,
        headers: Vec<TableCell>,
        rows: Vec<Vec<TableCell>>,
    },
    ThematicBreak,
}

impl MarkdownElement {
    pub fn kind(&self) -> BlockKind {
        match self {
            MarkdownElement::Paragraph(_) => BlockKind::Paragraph,
            MarkdownElement::Heading { .. } => BlockKind::Heading,
            MarkdownElement::CodeBlock { .. } => BlockKind::CodeBlock,
            MarkdownElement::BlockQuote(_) => BlockKind::BlockQuote,
            MarkdownElement::List { .. } => BlockKind::List,
            MarkdownElement::Table { .. } => BlockKind::Table,
            MarkdownElement::ThematicBreak => BlockKind::Rule,
        }
    }
}

/// Element kind without content, used for spacing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading,
    CodeBlock,
    BlockQuote,
    List,
    Table,
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<MarkdownElement>,
    /// Task list state
    pub checked: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub content: Vec<InlineContent>,
}

/// Inline formatting
#[derive(Debug, Clone, PartialEq)]
pub enum InlineContent {
    Text(String),
    Bold(Vec<InlineContent>),
    Italic(Vec<InlineContent>),
    Code(String),
    Link {
        text: Vec<InlineContent>,
        url: String,
    },
    Strikethrough(Vec<InlineContent>),
    SoftBreak,
    HardBreak,
}
