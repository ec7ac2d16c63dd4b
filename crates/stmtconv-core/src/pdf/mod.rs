//! PDF loading: positioned text fragments from page content streams.

pub mod builder;
mod extractor;
pub mod fonts;

pub use builder::PdfBuilder;
pub use extractor::PdfExtractor;

use crate::error::PdfError;
use crate::models::config::LoaderConfig;
use crate::models::document::{PageFragments, RawFragment};

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF loading implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract positioned fragments from a single page (1-indexed).
    fn extract_page(&self, page: u32) -> Result<Vec<RawFragment>>;

    /// Extract fragments for every page, in page order.
    fn extract_fragments(&self) -> Result<PageFragments>;
}

/// Load a document and return its fragments.
///
/// Fails with [`PdfError::NoPages`] or [`PdfError::NoText`] when there is
/// nothing to extract; pages without text yield empty sequences.
pub fn load_document(data: &[u8], config: &LoaderConfig) -> Result<PageFragments> {
    let mut extractor = PdfExtractor::new()
        .with_max_pages(config.max_pages)
        .with_tj_split_threshold(config.tj_split_threshold);
    extractor.load(data)?;
    extractor.extract_fragments()
}
