//! Row clustering: fragments sharing a horizontal band become one line.

use crate::models::document::RawFragment;

/// Gap (fraction of font size) below which two fragments are one word.
const GLUE_RATIO: f32 = 0.1;

/// Fragments on one visual line, ordered left to right.
#[derive(Debug, Clone)]
pub struct Line {
    pub fragments: Vec<RawFragment>,
    pub top: f32,
    pub bottom: f32,
}

impl Line {
    fn from_fragments(mut fragments: Vec<RawFragment>) -> Self {
        fragments.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        let top = fragments
            .iter()
            .map(|f| f.bbox.y0)
            .fold(f32::INFINITY, f32::min);
        let bottom = fragments
            .iter()
            .map(|f| f.bbox.y1)
            .fold(f32::NEG_INFINITY, f32::max);
        Self {
            fragments,
            top,
            bottom,
        }
    }

    /// Fragment texts joined with single spaces.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Group a page's fragments into lines, top to bottom.
///
/// A fragment joins the open line when its vertical centre lies within
/// `tolerance` of the line's running mean centre.
pub fn cluster_lines(fragments: &[RawFragment], tolerance: f32) -> Vec<Line> {
    let mut sorted: Vec<&RawFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<(f32, Vec<RawFragment>)> = Vec::new();
    for fragment in sorted {
        let cy = fragment.bbox.center_y();
        match groups.last_mut() {
            Some((center, members)) if (cy - *center).abs() <= tolerance => {
                members.push(fragment.clone());
                let n = members.len() as f32;
                *center += (cy - *center) / n;
            }
            _ => groups.push((cy, vec![fragment.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| Line::from_fragments(members))
        .collect()
}

/// Merge neighbouring fragments of a line that are closer than
/// `gap_ratio` times the font size.
pub fn merge_adjacent(line: &mut Line, gap_ratio: f32) {
    let mut merged: Vec<RawFragment> = Vec::with_capacity(line.fragments.len());

    for fragment in line.fragments.drain(..) {
        if let Some(last) = merged.last_mut() {
            let size = last.font_size.max(fragment.font_size);
            let gap = fragment.bbox.x0 - last.bbox.x1;
            if gap <= size * gap_ratio {
                if gap > size * GLUE_RATIO {
                    last.text.push(' ');
                }
                last.text.push_str(&fragment.text);
                last.bbox = last.bbox.union(&fragment.bbox);
                continue;
            }
        }
        merged.push(fragment);
    }

    line.fragments = merged;
}
