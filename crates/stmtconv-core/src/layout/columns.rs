//! Column inference from a header row or from recurring x-bands.

use serde::Serialize;

use super::rows::Line;
use crate::models::document::RawFragment;

/// Where a page's column structure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    /// Seeded from the page's header row.
    Header,
    /// Inferred from x-bands shared by many rows.
    Bands,
    /// Carried over from another page.
    Inherited,
}

/// Column structure of a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnLayout {
    /// Left edge of each column's content.
    pub starts: Vec<f32>,
    /// Separators between consecutive columns (`starts.len() - 1` entries).
    pub bounds: Vec<f32>,
    pub source: LayoutSource,
}

impl ColumnLayout {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Column containing the x-coordinate.
    pub fn column_of(&self, x: f32) -> usize {
        self.bounds
            .iter()
            .position(|b| x < *b)
            .unwrap_or(self.bounds.len())
    }

    /// True when `x` lies within `tolerance` of some column start.
    pub fn aligns_with_start(&self, x: f32, tolerance: f32) -> bool {
        self.starts.iter().any(|s| (x - s).abs() <= tolerance)
    }

    pub fn inherited(&self) -> Self {
        Self {
            source: LayoutSource::Inherited,
            ..self.clone()
        }
    }

    /// Columns seeded by header labels, separated at the midpoints of the gaps.
    pub fn from_header(header: &[RawFragment]) -> Self {
        let spans: Vec<(f32, f32)> = header.iter().map(|f| (f.bbox.x0, f.bbox.x1)).collect();
        Self::from_spans(spans, LayoutSource::Header)
    }

    fn from_spans(mut spans: Vec<(f32, f32)>, source: LayoutSource) -> Self {
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let bounds = spans
            .windows(2)
            .map(|w| {
                let (left, right) = (w[0], w[1]);
                if left.1 <= right.0 {
                    (left.1 + right.0) / 2.0
                } else {
                    ((left.0 + left.1) / 2.0 + (right.0 + right.1) / 2.0) / 2.0
                }
            })
            .collect();

        Self {
            starts: spans.iter().map(|s| s.0).collect(),
            bounds,
            source,
        }
    }
}

#[derive(Debug)]
struct Band {
    center: f32,
    /// (line index, fragment index) of every member.
    members: Vec<(usize, usize)>,
}

impl Band {
    fn support(&self) -> usize {
        let mut lines: Vec<usize> = self.members.iter().map(|m| m.0).collect();
        lines.dedup();
        lines.len()
    }
}

/// Cluster edge coordinates within `tolerance` of the running band centre.
fn cluster_edges(mut edges: Vec<(f32, (usize, usize))>, tolerance: f32) -> Vec<Band> {
    edges.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut bands: Vec<Band> = Vec::new();
    for (x, member) in edges {
        match bands.last_mut() {
            Some(band) if (x - band.center).abs() <= tolerance => {
                band.members.push(member);
                let n = band.members.len() as f32;
                band.center += (x - band.center) / n;
            }
            _ => bands.push(Band {
                center: x,
                members: vec![member],
            }),
        }
    }

    for band in &mut bands {
        band.members.sort_unstable();
    }
    bands
}

/// Infer columns from left and right edges that recur across lines.
///
/// Only lines with at least two fragments vote. A band counts when it is
/// supported by `max(2, min_support * voting lines)` distinct lines. Right
/// bands made mostly of fragments already in a left band are dropped, so
/// fixed-width values do not produce duplicate columns.
pub fn infer_bands(
    lines: &[Line],
    tolerance: f32,
    min_support: f32,
    min_columns: usize,
) -> Option<ColumnLayout> {
    let voting: Vec<usize> = (0..lines.len())
        .filter(|i| lines[*i].fragments.len() >= 2)
        .collect();
    if voting.is_empty() {
        return None;
    }
    let threshold = ((min_support * voting.len() as f32).ceil() as usize).max(2);

    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for &li in &voting {
        for (fi, f) in lines[li].fragments.iter().enumerate() {
            lefts.push((f.bbox.x0, (li, fi)));
            rights.push((f.bbox.x1, (li, fi)));
        }
    }

    let left_bands: Vec<Band> = cluster_edges(lefts, tolerance)
        .into_iter()
        .filter(|b| b.support() >= threshold)
        .collect();
    let right_bands: Vec<Band> = cluster_edges(rights, tolerance)
        .into_iter()
        .filter(|b| b.support() >= threshold)
        .filter(|b| {
            let shared = b
                .members
                .iter()
                .filter(|m| left_bands.iter().any(|l| l.members.binary_search(m).is_ok()))
                .count();
            shared * 2 <= b.members.len()
        })
        .collect();

    let span_of = |band: &Band| -> (f32, f32) {
        band.members.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (li, fi)| {
            let bbox = lines[*li].fragments[*fi].bbox;
            (lo.min(bbox.x0), hi.max(bbox.x1))
        })
    };

    let mut spans: Vec<(f32, f32)> = left_bands
        .iter()
        .map(|b| {
            let (_, hi) = span_of(b);
            (b.center, hi)
        })
        .chain(right_bands.iter().map(span_of))
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    // A band whose span sits inside another column's span is the same column.
    let mut columns: Vec<(f32, f32)> = Vec::with_capacity(spans.len());
    for span in spans {
        match columns.last_mut() {
            Some(last) if span.0 < last.1 && span.1 <= last.1 => {}
            _ => columns.push(span),
        }
    }

    if columns.len() < min_columns {
        return None;
    }
    Some(ColumnLayout::from_spans(columns, LayoutSource::Bands))
}
