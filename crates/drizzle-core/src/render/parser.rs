//! Markdown parsing using pulldown-cmark

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::elements::{InlineContent, ListItem, MarkdownElement, TableCell};
use super::sanitize::preprocess_math;

/// Bare URLs in text
static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s<>\[\]()]+").unwrap());

/// Parse Markdown text into block elements
pub fn parse(text: &str) -> Vec<MarkdownElement> {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let events: Vec<Event<'_>> = Parser::new_ext(text, options).collect();
    parse_blocks(&events)
}

fn parse_blocks(events: &[Event<'_>]) -> Vec<MarkdownElement> {
    let mut elements = Vec::new();
    let mut idx = 0;

    while idx < events.len() {
        match &events[idx] {
            Event::Start(Tag::Paragraph) => {
                let (content, next) = collect_inline(events, idx + 1, Some(TagEnd::Paragraph));
                if !content.is_empty() {
                    elements.push(MarkdownElement::Paragraph(content));
                }
                idx = next;
            }
            Event::Start(Tag::Heading { level, .. }) => {
                let (content, next) = collect_inline(events, idx + 1, Some(TagEnd::Heading(*level)));
                elements.push(MarkdownElement::Heading {
                    level: *level as u8,
                    content,
                });
                idx = next;
            }
            Event::Start(Tag::CodeBlock(_)) => {
                let end = block_end(events, idx);
                let code = events[idx + 1..end]
                    .iter()
                    .filter_map(|event| match event {
                        Event::Text(text) => Some(text.as_ref()),
                        _ => None,
                    })
                    .collect();
                elements.push(MarkdownElement::CodeBlock { code });
                idx = end + 1;
            }
            Event::Start(Tag::BlockQuote(_)) => {
                let end = block_end(events, idx);
                elements.push(MarkdownElement::BlockQuote(parse_blocks(&events[idx + 1..end])));
                idx = end + 1;
            }
            Event::Start(Tag::List(start)) => {
                let end = block_end(events, idx);
                elements.push(MarkdownElement::List {
                    start: *start,
                    items: parse_list_items(&events[idx + 1..end]),
                });
                idx = end + 1;
            }
            Event::Start(Tag::Table(alignments)) => {
                let end = block_end(events, idx);
                let (headers, rows) = parse_table(&events[idx + 1..end]);
                elements.push(MarkdownElement::Table {
                    alignments: alignments.clone(),
                    headers,
                    rows,
                });
                idx = end + 1;
            }
            Event::Start(Tag::HtmlBlock) => {
                let end = block_end(events, idx);
                let html: String = events[idx + 1..end]
                    .iter()
                    .filter_map(|event| match event {
                        Event::Html(text) | Event::Text(text) => Some(text.as_ref()),
                        _ => None,
                    })
                    .collect();
                let html = html.trim_end();
                if !html.is_empty() {
                    elements.push(MarkdownElement::Paragraph(vec![InlineContent::Text(
                        html.to_string(),
                    )]));
                }
                idx = end + 1;
            }
            Event::Rule => {
                elements.push(MarkdownElement::ThematicBreak);
                idx += 1;
            }
            // Tight list items carry inline content without a paragraph
            event if is_inline(event) => {
                let (content, next) = collect_inline(events, idx, None);
                if !content.is_empty() {
                    elements.push(MarkdownElement::Paragraph(content));
                }
                idx = next.max(idx + 1);
            }
            _ => idx += 1,
        }
    }

    elements
}

/// Index of the `End` matching the `Start` at `start`
fn block_end(events: &[Event<'_>], start: usize) -> usize {
    let mut depth = 0usize;
    for (idx, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return idx;
                }
            }
            _ => {}
        }
    }
    events.len()
}

fn is_inline(event: &Event<'_>) -> bool {
    matches!(
        event,
        Event::Text(_)
            | Event::Code(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::FootnoteReference(_)
            | Event::Start(Tag::Strong)
            | Event::Start(Tag::Emphasis)
            | Event::Start(Tag::Strikethrough)
            | Event::Start(Tag::Link { .. })
            | Event::Start(Tag::Image { .. })
            | Event::End(TagEnd::Strong)
            | Event::End(TagEnd::Emphasis)
            | Event::End(TagEnd::Strikethrough)
    )
}

#[derive(Clone, Copy)]
enum InlineStyle {
    Bold,
    Italic,
    Strikethrough,
}

/// Collect inline content from `start`.
///
/// With `end` set, stops after that end tag. Without it, stops at the first
/// block-level event (loose content in tight list items).
fn collect_inline(
    events: &[Event<'_>],
    start: usize,
    end: Option<TagEnd>,
) -> (Vec<InlineContent>, usize) {
    let mut content = Vec::new();
    let mut styles: Vec<InlineStyle> = Vec::new();
    let mut idx = start;

    while idx < events.len() {
        let event = &events[idx];
        if let (Some(end_tag), Event::End(tag)) = (&end, event) {
            if tag == end_tag {
                return (content, idx + 1);
            }
        }
        if end.is_none() && !is_inline(event) {
            break;
        }

        match event {
            Event::Text(text) => {
                // Adjacent text events are one run of prose
                let mut run = text.to_string();
                while let Some(Event::Text(more)) = events.get(idx + 1) {
                    run.push_str(more);
                    idx += 1;
                }
                for inline in autolink_text(&preprocess_math(&run)) {
                    push_styled(&mut content, inline, &styles);
                }
            }
            Event::Code(code) => {
                push_styled(&mut content, InlineContent::Code(code.to_string()), &styles)
            }
            Event::InlineHtml(html) => {
                push_styled(&mut content, InlineContent::Text(html.to_string()), &styles)
            }
            Event::FootnoteReference(label) => push_styled(
                &mut content,
                InlineContent::Text(format!("[^{}]", label)),
                &styles,
            ),
            Event::SoftBreak => content.push(InlineContent::SoftBreak),
            Event::HardBreak => content.push(InlineContent::HardBreak),
            Event::Start(Tag::Strong) => styles.push(InlineStyle::Bold),
            Event::Start(Tag::Emphasis) => styles.push(InlineStyle::Italic),
            Event::Start(Tag::Strikethrough) => styles.push(InlineStyle::Strikethrough),
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                styles.pop();
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                let (text, next) = collect_inline(events, idx + 1, Some(TagEnd::Link));
                let link = InlineContent::Link {
                    text,
                    url: dest_url.to_string(),
                };
                push_styled(&mut content, link, &styles);
                idx = next;
                continue;
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                let (alt, next) = collect_inline(events, idx + 1, Some(TagEnd::Image));
                let mut text = vec![InlineContent::Text("[image: ".to_string())];
                text.extend(alt);
                text.push(InlineContent::Text("]".to_string()));
                let image = InlineContent::Link {
                    text,
                    url: dest_url.to_string(),
                };
                push_styled(&mut content, image, &styles);
                idx = next;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }

    (content, idx)
}

fn push_styled(content: &mut Vec<InlineContent>, item: InlineContent, styles: &[InlineStyle]) {
    let wrapped = styles.iter().rev().fold(item, |inner, style| match style {
        InlineStyle::Bold => InlineContent::Bold(vec![inner]),
        InlineStyle::Italic => InlineContent::Italic(vec![inner]),
        InlineStyle::Strikethrough => InlineContent::Strikethrough(vec![inner]),
    });
    content.push(wrapped);
}

/// Split text around bare URLs, turning each URL into a link
fn autolink_text(text: &str) -> Vec<InlineContent> {
    let mut result = Vec::new();
    let mut last_end = 0;

    for mat in URL_REGEX.find_iter(text) {
        if mat.start() > last_end {
            result.push(InlineContent::Text(text[last_end..mat.start()].to_string()));
        }
        let url = mat.as_str().to_string();
        result.push(InlineContent::Link {
            text: vec![InlineContent::Text(url.clone())],
            url,
        });
        last_end = mat.end();
    }

    if last_end < text.len() || result.is_empty() {
        result.push(InlineContent::Text(text[last_end..].to_string()));
    }
    result
}

fn parse_list_items(events: &[Event<'_>]) -> Vec<ListItem> {
    let mut items = Vec::new();
    let mut idx = 0;

    while idx < events.len() {
        if !matches!(events[idx], Event::Start(Tag::Item)) {
            idx += 1;
            continue;
        }
        let end = block_end(events, idx);
        let body = &events[idx + 1..end.min(events.len())];

        // The item's own marker comes before any nested list
        let marker = body
            .iter()
            .take_while(|event| !matches!(event, Event::Start(Tag::List(_))))
            .position(|event| matches!(event, Event::TaskListMarker(_)));
        let checked = marker.map(|i| matches!(body[i], Event::TaskListMarker(true)));
        let body: Vec<Event<'_>> = body
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != marker)
            .map(|(_, event)| event.clone())
            .collect();

        items.push(ListItem {
            content: parse_blocks(&body),
            checked,
        });
        idx = end + 1;
    }

    items
}

fn parse_table(events: &[Event<'_>]) -> (Vec<TableCell>, Vec<Vec<TableCell>>) {
    let mut headers = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<TableCell> = Vec::new();
    let mut idx = 0;

    while idx < events.len() {
        match &events[idx] {
            Event::Start(Tag::TableCell) => {
                let (content, next) = collect_inline(events, idx + 1, Some(TagEnd::TableCell));
                row.push(TableCell { content });
                idx = next;
                continue;
            }
            Event::End(TagEnd::TableHead) => headers = std::mem::take(&mut row),
            Event::End(TagEnd::TableRow) => rows.push(std::mem::take(&mut row)),
            _ => {}
        }
        idx += 1;
    }

    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> InlineContent {
        InlineContent::Text(s.to_string())
    }

    #[test]
    fn test_autolink_detection() {
        let result = autolink_text("Check https://example.com here");
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], text("Check "));
        assert!(matches!(&result[1], InlineContent::Link { url, .. } if url == "https://example.com"));
        assert_eq!(result[2], text(" here"));
    }

    #[test]
    fn test_heading_and_paragraph() {
        let elements = parse("# Hello\n\nWorld");
        assert_eq!(
            elements,
            vec![
                MarkdownElement::Heading {
                    level: 1,
                    content: vec![text("Hello")],
                },
                MarkdownElement::Paragraph(vec![text("World")]),
            ]
        );
    }

    #[test]
    fn test_nested_emphasis() {
        let elements = parse("**bold _both_**");
        let MarkdownElement::Paragraph(content) = &elements[0] else {
            panic!("Expected paragraph: {:?}", elements);
        };
        assert_eq!(content[0], InlineContent::Bold(vec![text("bold ")]));
        assert_eq!(
            content[1],
            InlineContent::Bold(vec![InlineContent::Italic(vec![text("both")])])
        );
    }

    #[test]
    fn test_unclosed_fence_is_code_to_end() {
        let elements = parse("```rust\nfn main() {}\n");
        assert_eq!(
            elements,
            vec![MarkdownElement::CodeBlock {
                code: "fn main() {}\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_math_only_in_prose() {
        let elements = parse("Area $$a_1 * b$$ here\n\n```\n$$x$$\n```\n\n`$$y$$`\n");
        assert_eq!(
            elements,
            vec![
                MarkdownElement::Paragraph(vec![text("Area [Math: a_1 * b] here")]),
                MarkdownElement::CodeBlock {
                    code: "$$x$$\n".to_string(),
                },
                MarkdownElement::Paragraph(vec![InlineContent::Code("$$y$$".to_string())]),
            ]
        );
    }

    #[test]
    fn test_task_and_nested_lists() {
        let elements = parse("- [x] done\n- [ ] todo\n  1. sub\n");
        let MarkdownElement::List { start, items } = &elements[0] else {
            panic!("Expected list: {:?}", elements);
        };
        assert_eq!(*start, None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].checked, Some(true));
        assert_eq!(items[1].checked, Some(false));
        assert!(items[1]
            .content
            .iter()
            .any(|el| matches!(el, MarkdownElement::List { start: Some(1), .. })));
    }

    #[test]
    fn test_ordered_list_start() {
        let elements = parse("3. three\n4. four\n");
        assert!(matches!(
            &elements[0],
            MarkdownElement::List { start: Some(3), items } if items.len() == 2
        ));
    }

    #[test]
    fn test_table() {
        let elements = parse("| a | b |\n|---|--:|\n| 1 | 2 |\n| 3 | 4 |\n");
        let MarkdownElement::Table {
            alignments,
            headers,
            rows,
        } = &elements[0]
        else {
            panic!("Expected table: {:?}", elements);
        };
        assert_eq!(alignments.len(), 2);
        assert_eq!(headers.len(), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].content, vec![text("3")]);
    }

    #[test]
    fn test_blockquote() {
        let elements = parse("> quoted *text*\n");
        let MarkdownElement::BlockQuote(inner) = &elements[0] else {
            panic!("Expected quote: {:?}", elements);
        };
        assert!(matches!(&inner[0], MarkdownElement::Paragraph(_)));
    }
}
