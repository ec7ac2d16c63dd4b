//! Layout tokenization: positioned fragments into rows and column cells.
//!
//! Each page is clustered into lines, a header row is located, and the
//! page's column structure is taken from the header, from recurring
//! x-bands, or from the previous page. Body lines that only continue a
//! wrapped cell are folded into the row above.

pub mod columns;
pub mod continuation;
pub mod rows;

pub use columns::{ColumnLayout, LayoutSource};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::LayoutError;
use crate::models::config::LayoutConfig;
use crate::models::document::{PageFragments, RawFragment};
use crate::text::{fold, is_label};
use rows::Line;

/// Role of a row within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Above the first table header.
    Preamble,
    /// A table header, including repeats on later pages.
    Header,
    /// Table content.
    Body,
}

/// Text of one column within a row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    /// One entry per physical line that contributed to the cell.
    pub lines: Vec<String>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push_word(&mut self, word: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(word);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Row {
    /// Position of the row in the document, counted after merging.
    pub index: usize,
    pub page: usize,
    pub kind: RowKind,
    #[serde(skip)]
    pub fragments: Vec<RawFragment>,
    /// Always exactly one cell per layout column.
    pub cells: Vec<Cell>,
    pub top: f32,
    pub bottom: f32,
    /// Number of wrapped lines merged into this row.
    pub continuation_lines: usize,
}

impl Row {
    /// Assign the line's fragments to the layout's columns by x centre.
    pub fn from_line(line: Line, page: usize, kind: RowKind, layout: &ColumnLayout) -> Self {
        let mut cells = vec![Cell::default(); layout.len().max(1)];
        for fragment in &line.fragments {
            let column = layout.column_of(fragment.bbox.center_x()).min(cells.len() - 1);
            cells[column].push_word(&fragment.text);
        }
        for cell in &mut cells {
            if !cell.text.is_empty() {
                cell.lines.push(cell.text.clone());
            }
        }

        Self {
            index: 0,
            page,
            kind,
            fragments: line.fragments,
            cells,
            top: line.top,
            bottom: line.bottom,
            continuation_lines: 0,
        }
    }

    /// Text of a cell, or `""` past the last column.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(|c| c.text.as_str()).unwrap_or("")
    }

    /// All fragment texts in reading order.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub(crate) fn absorb(&mut self, other: Row, separator: &str) {
        for (cell, extra) in self.cells.iter_mut().zip(other.cells) {
            if extra.is_empty() {
                continue;
            }
            if cell.text.is_empty() {
                cell.text = extra.text;
            } else {
                cell.text.push_str(separator);
                cell.text.push_str(&extra.text);
            }
            cell.lines.extend(extra.lines);
        }
        self.fragments.extend(other.fragments);
        self.bottom = self.bottom.max(other.bottom);
        self.continuation_lines += 1 + other.continuation_lines;
    }
}

/// Tokenizer output for a whole document.
#[derive(Debug, Clone, Serialize)]
pub struct TokenizedDocument {
    pub rows: Vec<Row>,
    /// Header cell texts of the first header row, if any.
    pub header: Option<Vec<String>>,
    /// Column structure used for each page.
    pub layouts: Vec<Option<ColumnLayout>>,
}

impl TokenizedDocument {
    pub fn preamble(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.kind == RowKind::Preamble)
    }

    pub fn body(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.kind == RowKind::Body)
    }

    /// The first `limit` rows plus every header row.
    pub fn header_region(&self, limit: usize) -> Vec<&Row> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, r)| *i < limit || r.kind == RowKind::Header)
            .map(|(_, r)| r)
            .collect()
    }
}

/// Per-page decisions taken before rows are built.
struct PagePlan {
    lines: Vec<Line>,
    header: Option<usize>,
    layout: Option<ColumnLayout>,
}

pub struct LayoutTokenizer {
    config: LayoutConfig,
}

impl LayoutTokenizer {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn tokenize(&self, document: &PageFragments) -> Result<TokenizedDocument, LayoutError> {
        let mut plans = self.plan_pages(document);

        let Some(first) = plans.iter().find_map(|p| p.layout.clone()) else {
            if document.fragment_count() > 0 {
                return Err(LayoutError::NoStructure(format!(
                    "{} fragments on {} pages, no header or aligned columns",
                    document.fragment_count(),
                    document.page_count()
                )));
            }
            return Ok(TokenizedDocument {
                rows: Vec::new(),
                header: None,
                layouts: vec![None; plans.len()],
            });
        };

        // Leading pages without structure borrow the first one found.
        for plan in plans.iter_mut() {
            if plan.layout.is_some() {
                break;
            }
            plan.layout = Some(first.inherited());
        }

        let has_header = plans.iter().any(|p| p.header.is_some());
        let mut in_body = false;
        let mut header: Option<Vec<String>> = None;
        let mut rows: Vec<Row> = Vec::new();
        let mut layouts = Vec::with_capacity(plans.len());

        for (page, plan) in plans.into_iter().enumerate() {
            let layout = plan.layout.unwrap_or_else(|| first.inherited());
            let mut page_rows = Vec::with_capacity(plan.lines.len());
            // Letterhead lines above a repeated header are preamble again.
            if plan.header.is_some() {
                in_body = false;
            }

            for (i, line) in plan.lines.into_iter().enumerate() {
                let kind = if plan.header == Some(i) {
                    in_body = true;
                    RowKind::Header
                } else if in_body {
                    RowKind::Body
                } else if !has_header && self.is_tabular(&line, &layout) {
                    in_body = true;
                    RowKind::Body
                } else {
                    RowKind::Preamble
                };

                let row = Row::from_line(line, page, kind, &layout);
                if kind == RowKind::Header && header.is_none() {
                    header = Some(row.cells.iter().map(|c| c.text.clone()).collect());
                }
                page_rows.push(row);
            }

            let before = page_rows.len();
            let merged = continuation::merge_continuations(page_rows, &layout, &self.config);
            debug!(
                "Page {}: {} rows ({} continuation lines merged), {} columns from {:?}",
                page + 1,
                merged.len(),
                before - merged.len(),
                layout.len(),
                layout.source
            );
            rows.extend(merged);
            layouts.push(Some(layout));
        }

        for (index, row) in rows.iter_mut().enumerate() {
            row.index = index;
        }

        info!(
            "Tokenized {} rows on {} pages (header: {})",
            rows.len(),
            layouts.len(),
            header.as_ref().map(|h| h.join(" | ")).unwrap_or_else(|| "none".to_string())
        );

        Ok(TokenizedDocument {
            rows,
            header,
            layouts,
        })
    }

    fn plan_pages(&self, document: &PageFragments) -> Vec<PagePlan> {
        let mut header_text: Option<String> = None;
        let mut previous: Option<ColumnLayout> = None;
        let mut plans = Vec::with_capacity(document.page_count());

        for fragments in &document.pages {
            let mut lines = rows::cluster_lines(fragments, self.config.row_tolerance);
            for line in &mut lines {
                rows::merge_adjacent(line, self.config.word_gap_ratio);
            }

            let header = match &header_text {
                None => self.find_header(&lines),
                Some(text) => lines.iter().position(|l| fold(&l.text()) == *text),
            };

            let layout = match header {
                Some(h) => {
                    if header_text.is_none() {
                        header_text = Some(fold(&lines[h].text()));
                    }
                    Some(ColumnLayout::from_header(&lines[h].fragments))
                }
                None => match &previous {
                    Some(layout) => Some(layout.inherited()),
                    None => columns::infer_bands(
                        &lines,
                        self.config.column_tolerance,
                        self.config.min_band_support,
                        self.config.min_columns,
                    ),
                },
            };

            if layout.is_some() {
                previous = layout.clone();
            }
            plans.push(PagePlan {
                lines,
                header,
                layout,
            });
        }

        plans
    }

    /// The label-like line with the most fragments near the top of the page.
    fn find_header(&self, lines: &[Line]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;

        for (i, line) in lines.iter().take(self.config.header_search_rows).enumerate() {
            let count = line.fragments.len();
            if count < self.config.min_columns {
                continue;
            }
            if !line.fragments.iter().all(|f| is_label(&f.text)) {
                continue;
            }
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((i, count));
            }
        }

        best.map(|(i, _)| i)
    }

    /// A line that spreads over at least `min_columns` columns.
    fn is_tabular(&self, line: &Line, layout: &ColumnLayout) -> bool {
        let mut used: Vec<usize> = line
            .fragments
            .iter()
            .map(|f| layout.column_of(f.bbox.center_x()))
            .collect();
        used.dedup();
        used.len() >= self.config.min_columns
    }
}
