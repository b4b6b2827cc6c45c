//! Table rendering with box-drawing borders
//!
//! Column widths are measured in terminal cells, so wide characters line up.

use pulldown_cmark::Alignment;

use super::elements::TableCell;
use super::inline::{line_width, render_inline, Line, Span, SpanStyle};
use crate::theme::ThemeMap;

struct Borders {
    left: &'static str,
    mid: &'static str,
    right: &'static str,
}

const TOP: Borders = Borders {
    left: "┌",
    mid: "┬",
    right: "┐",
};
const SEPARATOR: Borders = Borders {
    left: "├",
    mid: "┼",
    right: "┤",
};
const BOTTOM: Borders = Borders {
    left: "└",
    mid: "┴",
    right: "┘",
};

pub fn render_table(
    alignments: &[Alignment],
    headers: &[TableCell],
    rows: &[Vec<TableCell>],
    theme: &ThemeMap,
) -> Vec<Line> {
    let header_cells: Vec<Line> = headers
        .iter()
        .map(|cell| cell_spans(cell, theme, SpanStyle::default().bold()))
        .collect();
    let body: Vec<Vec<Line>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell_spans(cell, theme, SpanStyle::default()))
                .collect()
        })
        .collect();

    let columns = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_cells.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return Vec::new();
    }

    let mut widths = vec![1usize; columns];
    for row in std::iter::once(&header_cells).chain(body.iter()) {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(line_width(cell));
        }
    }

    let mut lines = vec![border(&widths, &TOP)];
    if !header_cells.is_empty() {
        lines.push(row_line(&header_cells, &widths, alignments));
        lines.push(border(&widths, &SEPARATOR));
    }
    for row in &body {
        lines.push(row_line(row, &widths, alignments));
    }
    lines.push(border(&widths, &BOTTOM));
    lines
}

fn border_style() -> SpanStyle {
    SpanStyle::default().dim()
}

/// A cell on a single line; breaks inside a cell become spaces
fn cell_spans(cell: &TableCell, theme: &ThemeMap, base: SpanStyle) -> Line {
    let mut spans = Vec::new();
    for (idx, line) in render_inline(&cell.content, theme, base)
        .into_iter()
        .enumerate()
    {
        if idx > 0 {
            spans.push(Span::raw(" "));
        }
        spans.extend(line);
    }
    spans
}

fn border(widths: &[usize], chars: &Borders) -> Line {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    let text = format!("{}{}{}", chars.left, segments.join(chars.mid), chars.right);
    vec![Span::styled(text, border_style())]
}

fn row_line(cells: &[Line], widths: &[usize], alignments: &[Alignment]) -> Line {
    let mut line = vec![Span::styled("│", border_style())];
    for (col, width) in widths.iter().enumerate() {
        let cell = cells.get(col).map(Vec::as_slice).unwrap_or(&[]);
        let gap = width.saturating_sub(line_width(cell));
        let (before, after) = match alignments.get(col) {
            Some(Alignment::Right) => (gap, 0),
            Some(Alignment::Center) => (gap / 2, gap - gap / 2),
            _ => (0, gap),
        };

        line.push(Span::raw(" ".repeat(before + 1)));
        line.extend(cell.iter().cloned());
        line.push(Span::raw(" ".repeat(after + 1)));
        line.push(Span::styled("│", border_style()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::elements::InlineContent;

    fn cell(text: &str) -> TableCell {
        TableCell {
            content: vec![InlineContent::Text(text.to_string())],
        }
    }

    fn plain(line: &Line) -> String {
        line.iter().map(|span| span.text.as_str()).collect()
    }

    #[test]
    fn test_basic_table_layout() {
        let theme = ThemeMap::default();
        let lines = render_table(
            &[Alignment::None, Alignment::Right],
            &[cell("name"), cell("n")],
            &[vec![cell("a"), cell("10")]],
            &theme,
        );
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(
            text,
            vec![
                "┌──────┬────┐",
                "│ name │  n │",
                "├──────┼────┤",
                "│ a    │ 10 │",
                "└──────┴────┘",
            ]
        );
    }

    #[test]
    fn test_wide_characters_align() {
        let theme = ThemeMap::default();
        let lines = render_table(&[], &[cell("日本")], &[vec![cell("ab")]], &theme);
        let widths: Vec<usize> = lines.iter().map(|l| line_width(l)).collect();
        assert!(widths.iter().all(|&w| w == widths[0]), "{:?}", widths);
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let theme = ThemeMap::default();
        let lines = render_table(&[], &[cell("a")], &[vec![cell("1"), cell("2")]], &theme);
        assert_eq!(plain(&lines[1]), "│ a │   │");
    }

    #[test]
    fn test_header_is_bold() {
        let theme = ThemeMap::default();
        let lines = render_table(&[], &[cell("h")], &[], &theme);
        assert!(lines[1].iter().any(|span| span.text == "h" && span.style.bold));
    }
}
