//! Wrapped-cell merging.
//!
//! A body line whose anchor column is empty, that sits directly under the
//! previous body row, and whose leftmost fragment starts at a known column
//! start is the continuation of that row's cells rather than a new row.

use super::columns::ColumnLayout;
use super::{Row, RowKind};
use crate::models::config::LayoutConfig;

/// Merge continuation rows of one page into their predecessors.
///
/// `rows` must be in reading order and belong to a single page.
pub fn merge_continuations(rows: Vec<Row>, layout: &ColumnLayout, config: &LayoutConfig) -> Vec<Row> {
    let mut out: Vec<Row> = Vec::with_capacity(rows.len());

    for row in rows {
        let merge = match out.last() {
            Some(prev) => is_continuation(prev, &row, layout, config),
            None => false,
        };

        match out.last_mut() {
            Some(prev) if merge => prev.absorb(row, &config.continuation_separator),
            _ => out.push(row),
        }
    }

    out
}

fn is_continuation(prev: &Row, row: &Row, layout: &ColumnLayout, config: &LayoutConfig) -> bool {
    if prev.kind != RowKind::Body || row.kind != RowKind::Body || prev.page != row.page {
        return false;
    }
    if !row.cell(0).is_empty() {
        return false;
    }
    if row.top - prev.bottom > config.continuation_max_gap {
        return false;
    }
    match row.fragments.first() {
        Some(first) => layout.aligns_with_start(first.bbox.x0, config.column_tolerance),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::rows::Line;
    use crate::models::document::{BBox, RawFragment};
    use pretty_assertions::assert_eq;

    fn frag(text: &str, x: f32, y: f32) -> RawFragment {
        let width = text.len() as f32 * 4.5;
        RawFragment::new(text, 0, BBox::new(x, y - 7.2, x + width, y + 1.8), 9.0)
    }

    fn layout() -> ColumnLayout {
        ColumnLayout::from_header(&[
            frag("Date", 50.0, 80.0),
            frag("Description", 130.0, 80.0),
            frag("Debit", 330.0, 80.0),
            frag("Credit", 400.0, 80.0),
            frag("Balance", 470.0, 80.0),
        ])
    }

    fn body(fragments: Vec<RawFragment>, layout: &ColumnLayout) -> Row {
        let line = Line {
            top: fragments.iter().map(|f| f.bbox.y0).fold(f32::INFINITY, f32::min),
            bottom: fragments.iter().map(|f| f.bbox.y1).fold(f32::NEG_INFINITY, f32::max),
            fragments,
        };
        Row::from_line(line, 0, RowKind::Body, layout)
    }

    fn texts(rows: &[Row]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.cells.iter().map(|c| c.text.clone()).collect())
            .collect()
    }

    #[test]
    fn test_wrapped_description_is_merged() {
        let layout = layout();
        let config = LayoutConfig::default();
        let rows = vec![
            body(vec![frag("01-Jan-24", 50.0, 100.0), frag("Transfer to", 130.0, 100.0), frag("25.00", 330.0, 100.0)], &layout),
            body(vec![frag("John Doe", 130.0, 111.0)], &layout),
            body(vec![frag("Ref 42", 130.0, 122.0)], &layout),
            body(vec![frag("02-Jan-24", 50.0, 140.0), frag("Fee", 130.0, 140.0), frag("1.00", 330.0, 140.0)], &layout),
        ];

        let merged = merge_continuations(rows, &layout, &config);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            texts(&merged)[0],
            vec!["01-Jan-24", "Transfer to | John Doe | Ref 42", "25.00", "", ""]
        );
        assert_eq!(merged[0].cells[1].lines, vec!["Transfer to", "John Doe", "Ref 42"]);
        assert_eq!(merged[0].continuation_lines, 2);
        assert_eq!(texts(&merged)[1][1], "Fee");
    }

    #[test]
    fn test_distant_line_is_not_merged() {
        let layout = layout();
        let config = LayoutConfig::default();
        let rows = vec![
            body(vec![frag("01-Jan-24", 50.0, 100.0), frag("Transfer", 130.0, 100.0), frag("25.00", 330.0, 100.0)], &layout),
            body(vec![frag("Page total", 130.0, 160.0)], &layout),
        ];

        let merged = merge_continuations(rows, &layout, &config);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_misaligned_line_is_not_merged() {
        let layout = layout();
        let config = LayoutConfig::default();
        let rows = vec![
            body(vec![frag("01-Jan-24", 50.0, 100.0), frag("Transfer", 130.0, 100.0)], &layout),
            body(vec![frag("stray note", 200.0, 111.0)], &layout),
        ];

        let merged = merge_continuations(rows, &layout, &config);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_line_with_anchor_starts_new_row() {
        let layout = layout();
        let config = LayoutConfig::default();
        let rows = vec![
            body(vec![frag("01-Jan-24", 50.0, 100.0), frag("Transfer", 130.0, 100.0)], &layout),
            body(vec![frag("02-Jan-24", 50.0, 111.0), frag("Fee", 130.0, 111.0)], &layout),
        ];

        let merged = merge_continuations(rows, &layout, &config);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_continuation_filling_several_columns() {
        let layout = layout();
        let config = LayoutConfig::default();
        let rows = vec![
            body(vec![frag("01-Jan-24", 50.0, 100.0), frag("POS purchase", 130.0, 100.0), frag("9.99", 330.0, 100.0)], &layout),
            body(vec![frag("MARKET", 130.0, 111.0), frag("EUR", 330.0, 111.0)], &layout),
        ];

        let merged = merge_continuations(rows, &layout, &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(texts(&merged)[0][1], "POS purchase | MARKET");
        assert_eq!(texts(&merged)[0][2], "9.99 | EUR");
    }

    #[test]
    fn test_preamble_is_never_merged() {
        let layout = layout();
        let config = LayoutConfig::default();
        let mut first = body(vec![frag("Account", 130.0, 100.0)], &layout);
        first.kind = RowKind::Preamble;
        let rows = vec![first, body(vec![frag("holder", 130.0, 111.0)], &layout)];

        let merged = merge_continuations(rows, &layout, &config);
        assert_eq!(merged.len(), 2);
    }
}
