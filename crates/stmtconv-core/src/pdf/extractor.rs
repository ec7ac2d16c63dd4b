//! Positioned text extraction by interpreting page content streams with lopdf.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::fonts::{number, FontInfo};
use super::{PdfProcessor, Result};
use crate::error::PdfError;
use crate::models::document::{BBox, PageFragments, RawFragment};

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// US Letter, used when a page tree carries no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Glyph extent above and below the baseline, as a fraction of the font size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// `TJ` displacement (thousandths of an em) that reads as a word space.
const TJ_SPACE_THRESHOLD: f32 = 120.0;

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// PDF fragment extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    max_pages: usize,
    tj_split_threshold: f32,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            max_pages: 0,
            tj_split_threshold: 300.0,
        }
    }

    /// Limit the number of pages processed (0 = unlimited).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the `TJ` displacement that splits a string into two fragments.
    pub fn with_tj_split_threshold(mut self, threshold: f32) -> Self {
        self.tj_split_threshold = threshold;
        self
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn page_fragments(&self, doc: &Document, index: usize, page_id: ObjectId) -> Result<Vec<RawFragment>> {
        let content = doc.get_page_content(page_id).map_err(|e| PdfError::Content {
            page: index as u32 + 1,
            reason: e.to_string(),
        })?;
        let content = Content::decode(&content).map_err(|e| PdfError::Content {
            page: index as u32 + 1,
            reason: e.to_string(),
        })?;

        let media_box = inherited_attribute(doc, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| {
                let values: Vec<f32> = arr
                    .iter()
                    .filter_map(|v| doc.dereference(v).ok().and_then(|(_, o)| number(o)))
                    .collect();
                <[f32; 4]>::try_from(values).ok()
            })
            .unwrap_or(DEFAULT_MEDIA_BOX);

        let resources = inherited_attribute(doc, page_id, b"Resources")
            .and_then(|o| o.as_dict().ok());

        let mut interpreter = PageInterpreter::new(doc, index, media_box, self.tj_split_threshold);
        interpreter.run(&content.operations, resources, 0);

        trace!(
            "Page {}: {} operations -> {} fragments",
            index + 1,
            content.operations.len(),
            interpreter.fragments.len()
        );
        Ok(interpreter.fragments)
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_page(&self, page: u32) -> Result<Vec<RawFragment>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = pages
            .get(&page)
            .ok_or_else(|| PdfError::Parse(format!("invalid page number: {}", page)))?;
        self.page_fragments(doc, page.saturating_sub(1) as usize, *page_id)
    }

    fn extract_fragments(&self) -> Result<PageFragments> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        let limit = if self.max_pages == 0 {
            pages.len()
        } else {
            self.max_pages.min(pages.len())
        };
        if limit < pages.len() {
            debug!("Processing first {} of {} pages", limit, pages.len());
        }

        let mut result = PageFragments::default();
        let mut first_failure = None;

        for (index, (_, page_id)) in pages.iter().take(limit).enumerate() {
            match self.page_fragments(doc, index, *page_id) {
                Ok(fragments) => result.pages.push(fragments),
                Err(e) => {
                    warn!("Skipping unreadable page {}: {}", index + 1, e);
                    result.pages.push(Vec::new());
                    first_failure.get_or_insert(e);
                }
            }
        }

        if result.is_empty() {
            return Err(first_failure.unwrap_or(PdfError::NoText));
        }

        debug!(
            "Extracted {} fragments from {} pages",
            result.fragment_count(),
            result.page_count()
        );
        Ok(result)
    }
}

/// Look up a page attribute, walking `Parent` links for inherited values.
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node_id = page_id;
    for _ in 0..32 {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, o)| o);
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return None,
        }
    }
    None
}

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

fn operand(ops: &[Object], i: usize) -> f32 {
    ops.get(i).and_then(number).unwrap_or(0.0)
}

fn matrix_operands(ops: &[Object]) -> Option<Matrix> {
    if ops.len() < 6 {
        return None;
    }
    Some([
        operand(ops, 0),
        operand(ops, 1),
        operand(ops, 2),
        operand(ops, 3),
        operand(ops, 4),
        operand(ops, 5),
    ])
}

/// Text parameters that belong to the graphics state.
#[derive(Debug, Clone)]
struct TextParams {
    font: Option<Rc<FontInfo>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horiz_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextParams,
}

/// Text being accumulated into one fragment.
#[derive(Debug)]
struct Run {
    text: String,
    start: (f32, f32),
    end: (f32, f32),
    font_size: f32,
}

struct PageInterpreter<'a> {
    doc: &'a Document,
    page: usize,
    media_box: [f32; 4],
    split_threshold: f32,
    font_cache: HashMap<ObjectId, Rc<FontInfo>>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    run: Option<Run>,
    fragments: Vec<RawFragment>,
}

impl<'a> PageInterpreter<'a> {
    fn new(doc: &'a Document, page: usize, media_box: [f32; 4], split_threshold: f32) -> Self {
        Self {
            doc,
            page,
            media_box,
            split_threshold,
            font_cache: HashMap::new(),
            state: GraphicsState {
                ctm: IDENTITY,
                text: TextParams::default(),
            },
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            run: None,
            fragments: Vec::new(),
        }
    }

    fn run(&mut self, ops: &[Operation], resources: Option<&'a Dictionary>, depth: usize) {
        for op in ops {
            let args = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    self.flush();
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operands(args) {
                        self.state.ctm = multiply(&m, &self.state.ctm);
                    }
                }
                "BT" => {
                    self.tm = IDENTITY;
                    self.tlm = IDENTITY;
                }
                "ET" => self.flush(),
                "Tf" => {
                    self.flush();
                    if let Some(name) = args.first().and_then(|o| o.as_name().ok()) {
                        self.state.text.font = self.resolve_font(resources, name);
                    }
                    self.state.text.font_size = operand(args, 1);
                }
                "Tc" => self.state.text.char_spacing = operand(args, 0),
                "Tw" => self.state.text.word_spacing = operand(args, 0),
                "Tz" => self.state.text.horiz_scale = operand(args, 0) / 100.0,
                "TL" => self.state.text.leading = operand(args, 0),
                "Ts" => self.state.text.rise = operand(args, 0),
                "Td" => self.translate_line(operand(args, 0), operand(args, 1)),
                "TD" => {
                    self.state.text.leading = -operand(args, 1);
                    self.translate_line(operand(args, 0), operand(args, 1));
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(args) {
                        self.flush();
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = args.first() {
                        self.show(bytes);
                    }
                    self.flush();
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = args.first() {
                        self.show(bytes);
                    }
                    self.flush();
                }
                "\"" => {
                    self.state.text.word_spacing = operand(args, 0);
                    self.state.text.char_spacing = operand(args, 1);
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = args.get(2) {
                        self.show(bytes);
                    }
                    self.flush();
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = args.first() {
                        self.show_array(items);
                    }
                    self.flush();
                }
                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        if let Some(name) = args.first().and_then(|o| o.as_name().ok()) {
                            self.run_form(resources, name, depth);
                        }
                    }
                }
                _ => {}
            }
        }
        self.flush();
    }

    fn resolve_font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<Rc<FontInfo>> {
        let fonts = resources?.get(b"Font").ok()?;
        let (_, fonts) = self.doc.dereference(fonts).ok()?;
        let entry = fonts.as_dict().ok()?.get(name).ok()?;

        if let Object::Reference(id) = entry {
            if let Some(cached) = self.font_cache.get(id) {
                return Some(Rc::clone(cached));
            }
            let dict = self.doc.get_object(*id).ok()?.as_dict().ok()?;
            let font = Rc::new(FontInfo::from_dict(self.doc, dict));
            self.font_cache.insert(*id, Rc::clone(&font));
            return Some(font);
        }

        let dict = entry.as_dict().ok()?;
        Some(Rc::new(FontInfo::from_dict(self.doc, dict)))
    }

    fn run_form(&mut self, resources: Option<&'a Dictionary>, name: &[u8], depth: usize) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| doc.dereference(x).ok())
            .and_then(|(_, x)| x.as_dict().ok())
            .and_then(|x| x.get(name).ok())
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_stream().ok())
        else {
            return;
        };

        let is_form = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            == Some(b"Form".as_slice());
        if !is_form {
            trace!("Skipping non-form XObject");
            return;
        }

        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = match Content::decode(&bytes) {
            Ok(c) => c,
            Err(e) => {
                debug!("Failed to decode form XObject: {}", e);
                return;
            }
        };

        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
            .or(resources);

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| matrix_operands(arr))
            .unwrap_or(IDENTITY);

        self.flush();
        self.stack.push(self.state.clone());
        let (saved_tm, saved_tlm) = (self.tm, self.tlm);
        self.state.ctm = multiply(&matrix, &self.state.ctm);

        self.run(&content.operations, form_resources, depth + 1);

        if let Some(saved) = self.stack.pop() {
            self.state = saved;
        }
        self.tm = saved_tm;
        self.tlm = saved_tlm;
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.flush();
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.translate_line(0.0, -leading);
    }

    /// Current text origin in device space.
    fn origin(&self) -> (f32, f32) {
        let m = multiply(&self.tm, &self.state.ctm);
        apply(&m, 0.0, self.state.text.rise)
    }

    fn device_font_size(&self) -> f32 {
        let m = multiply(&self.tm, &self.state.ctm);
        (self.state.text.font_size * (m[2].powi(2) + m[3].powi(2)).sqrt()).abs()
    }

    fn advance(&mut self, tx: f32) {
        self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
    }

    fn show(&mut self, bytes: &[u8]) {
        let font = self.state.text.font.clone().unwrap_or_default();
        let params = self.state.text.clone();
        let mut pending_spaces = 0usize;

        for glyph in font.decode(bytes) {
            let is_space = glyph.text.chars().all(char::is_whitespace) && !glyph.text.is_empty();

            if is_space {
                pending_spaces += 1;
            } else {
                // Runs of padding spaces separate columns.
                if pending_spaces >= 2 {
                    self.flush();
                } else if pending_spaces == 1 {
                    if let Some(run) = self.run.as_mut() {
                        run.text.push(' ');
                    }
                }
                pending_spaces = 0;

                if !glyph.text.is_empty() {
                    let origin = self.origin();
                    let size = self.device_font_size();
                    let run = self.run.get_or_insert_with(|| Run {
                        text: String::new(),
                        start: origin,
                        end: origin,
                        font_size: size,
                    });
                    run.text.push_str(&glyph.text);
                }
            }

            let mut tx = font.width(glyph.code) / 1000.0 * params.font_size + params.char_spacing;
            if glyph.is_word_space {
                tx += params.word_spacing;
            }
            self.advance(tx * params.horiz_scale);

            if !is_space {
                let end = self.origin();
                if let Some(run) = self.run.as_mut() {
                    run.end = end;
                }
            }
        }

        if pending_spaces >= 2 {
            self.flush();
        }
    }

    fn show_array(&mut self, items: &[Object]) {
        let params = self.state.text.clone();
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    let Some(adjust) = number(other) else {
                        continue;
                    };
                    if -adjust >= self.split_threshold {
                        self.flush();
                    } else if -adjust >= TJ_SPACE_THRESHOLD {
                        if let Some(run) = self.run.as_mut() {
                            if !run.text.ends_with(' ') {
                                run.text.push(' ');
                            }
                        }
                    }
                    let tx = -adjust / 1000.0 * params.font_size * params.horiz_scale;
                    self.advance(tx);
                }
            }
        }
    }

    fn flush(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let text = run.text.trim();
        if text.is_empty() {
            return;
        }

        let [llx, _, _, ury] = self.media_box;
        let x0 = run.start.0.min(run.end.0) - llx;
        let x1 = run.start.0.max(run.end.0) - llx;
        let baseline = ury - run.start.1;
        let size = run.font_size.max(1.0);

        self.fragments.push(RawFragment::new(
            text,
            self.page,
            BBox::new(x0, baseline - size * ASCENT, x1, baseline + size * DESCENT),
            size,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfBuilder;

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_load_garbage_is_parse_error() {
        let mut extractor = PdfExtractor::new();
        let err = extractor.load(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn test_fragment_positions() {
        let bytes = PdfBuilder::new()
            .with_font_size(10.0)
            .text(50.0, 100.0, "Date")
            .text_right(300.0, 100.0, "1,234.56")
            .build()
            .unwrap();

        let mut extractor = PdfExtractor::new();
        extractor.load(&bytes).unwrap();
        let frags = extractor.extract_page(1).unwrap();

        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].text, "Date");
        assert!((frags[0].bbox.x0 - 50.0).abs() < 0.01);
        assert!((frags[0].bbox.x1 - 70.0).abs() < 0.01);
        assert!((frags[0].bbox.y1 - 102.0).abs() < 0.01);
        assert!((frags[0].font_size - 10.0).abs() < 0.01);
        assert_eq!(frags[1].text, "1,234.56");
        assert!((frags[1].bbox.x1 - 300.0).abs() < 0.01);
    }

    #[test]
    fn test_letter_page_keeps_top_down_positions() {
        let bytes = PdfBuilder::new()
            .with_page_size(612.0, 792.0)
            .with_font_size(10.0)
            .text(72.0, 700.0, "Closing balance")
            .build()
            .unwrap();

        let mut extractor = PdfExtractor::new();
        extractor.load(&bytes).unwrap();
        let frags = extractor.extract_page(1).unwrap();

        assert_eq!(frags.len(), 1);
        assert!((frags[0].bbox.x0 - 72.0).abs() < 0.01);
        assert!((frags[0].bbox.y0 - 692.0).abs() < 0.01);
        assert!((frags[0].bbox.y1 - 702.0).abs() < 0.01);
    }

    #[test]
    fn test_padding_spaces_split_fragments() {
        let bytes = PdfBuilder::new()
            .text(50.0, 100.0, "Opening   balance")
            .text(50.0, 120.0, "Opening balance")
            .build()
            .unwrap();

        let mut extractor = PdfExtractor::new();
        extractor.load(&bytes).unwrap();
        let frags = extractor.extract_page(1).unwrap();

        let texts: Vec<&str> = frags.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Opening", "balance", "Opening balance"]);
    }

    #[test]
    fn test_blank_page_yields_empty_sequence() {
        let bytes = PdfBuilder::new()
            .text(50.0, 100.0, "Statement")
            .blank_page()
            .build()
            .unwrap();

        let mut extractor = PdfExtractor::new();
        extractor.load(&bytes).unwrap();
        let doc = extractor.extract_fragments().unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].len(), 1);
        assert!(doc.pages[1].is_empty());
    }

    #[test]
    fn test_no_text_anywhere() {
        let bytes = PdfBuilder::new().blank_page().build().unwrap();
        let mut extractor = PdfExtractor::new();
        extractor.load(&bytes).unwrap();
        assert!(matches!(extractor.extract_fragments(), Err(PdfError::NoText)));
    }

    #[test]
    fn test_max_pages() {
        let bytes = PdfBuilder::new()
            .text(50.0, 100.0, "one")
            .page()
            .text(50.0, 100.0, "two")
            .build()
            .unwrap();

        let mut extractor = PdfExtractor::new().with_max_pages(1);
        extractor.load(&bytes).unwrap();
        assert_eq!(extractor.extract_fragments().unwrap().page_count(), 1);
    }

    #[test]
    fn test_matrix_multiply_translation() {
        let t1 = [1.0, 0.0, 0.0, 1.0, 10.0, 20.0];
        let t2 = [2.0, 0.0, 0.0, 2.0, 5.0, 5.0];
        let m = multiply(&t1, &t2);
        assert_eq!(apply(&m, 0.0, 0.0), (25.0, 45.0));
    }
}
