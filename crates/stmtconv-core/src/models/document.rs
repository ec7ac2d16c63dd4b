//! Positioned text produced by the document loader.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in top-down page coordinates (points).
///
/// `y0` is the top edge and `y1` the bottom edge, so `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A positioned text run extracted from a PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    /// Decoded text.
    pub text: String,
    /// Page index (0-based).
    pub page: usize,
    /// Bounding box on the page.
    pub bbox: BBox,
    /// Effective font size in points.
    pub font_size: f32,
}

impl RawFragment {
    pub fn new(text: impl Into<String>, page: usize, bbox: BBox, font_size: f32) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            font_size,
        }
    }
}

/// Fragments of a whole document, one sequence per page in page order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageFragments {
    pub pages: Vec<Vec<RawFragment>>,
}

impl PageFragments {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fragment_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes_corners() {
        let b = BBox::new(10.0, 20.0, 5.0, 8.0);
        assert_eq!(b.x0, 5.0);
        assert_eq!(b.y0, 8.0);
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.center_y(), 14.0);
    }

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 5.0, 30.0, 12.0);
        let u = a.union(&b);
        assert_eq!(u, BBox::new(0.0, 0.0, 30.0, 12.0));
    }
}
