//! Minimal text-only PDF writer for fixtures and tests.
//!
//! Coordinates are top-down points, matching [`RawFragment`] boxes, so a
//! fixture reads the same way the loader reports it. Every glyph is 500/1000 em
//! wide; the font dictionary declares that width explicitly.
//!
//! [`RawFragment`]: crate::models::document::RawFragment

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::error::PdfError;

const GLYPH_WIDTH: i64 = 500;

#[derive(Debug, Clone)]
struct TextItem {
    x: f32,
    y: f32,
    text: String,
    size: f32,
}

/// Builder for synthetic statement PDFs.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    width: f32,
    height: f32,
    font_size: f32,
    pages: Vec<Vec<TextItem>>,
}

impl PdfBuilder {
    /// A4 portrait, 9pt Helvetica, no pages yet.
    pub fn new() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            font_size: 9.0,
            pages: Vec::new(),
        }
    }

    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Font size for text added after this call.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    /// Start a new page.
    pub fn page(mut self) -> Self {
        self.pages.push(Vec::new());
        self
    }

    /// Add a page with no text, like a scanned image page.
    pub fn blank_page(self) -> Self {
        self.page()
    }

    /// Left-aligned text with its baseline at `y` (top-down).
    pub fn text(mut self, x: f32, y: f32, text: &str) -> Self {
        let item = TextItem {
            x,
            y,
            text: text.to_string(),
            size: self.font_size,
        };
        match self.pages.last_mut() {
            Some(page) => page.push(item),
            None => self.pages.push(vec![item]),
        }
        self
    }

    /// Right-aligned text ending at `right`.
    pub fn text_right(self, right: f32, y: f32, text: &str) -> Self {
        let width = Self::text_width(text, self.font_size);
        self.text(right - width, y, text)
    }

    /// Several left-aligned cells on one baseline.
    pub fn row(self, y: f32, cells: &[(f32, &str)]) -> Self {
        cells
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .fold(self, |b, (x, text)| b.text(*x, y, text))
    }

    /// Rendered width of `text` at `size`.
    pub fn text_width(text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size * GLYPH_WIDTH as f32 / 1000.0
    }

    /// Serialize the document.
    pub fn build(&self) -> Result<Vec<u8>, PdfError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let widths: Vec<Object> = (32..=255).map(|_| Object::Integer(GLYPH_WIDTH)).collect();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
            "FirstChar" => 32,
            "LastChar" => 255,
            "Widths" => widths,
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for items in &self.pages {
            let mut operations = Vec::new();
            for item in items {
                let baseline = self.height - item.y;
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), Object::Real(item.size.into())]));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Real(item.x.into()), Object::Real(baseline.into())],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(latin1(&item.text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| PdfError::Parse(format!("failed to encode content: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(self.width.into()),
                Object::Real(self.height.into()),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| PdfError::Parse(format!("failed to write PDF: {}", e)))?;
        Ok(out)
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(PdfBuilder::text_width("abcd", 10.0), 20.0);
    }

    #[test]
    fn test_build_zero_pages() {
        let bytes = PdfBuilder::new().build().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn test_latin1_encoding() {
        assert_eq!(latin1("Kë€"), vec![b'K', 0xEB, b'?']);
    }
}
