//! Statement field extraction module.

pub mod balance;
mod metadata;
mod parser;
pub mod rules;

pub use metadata::extract_metadata;
pub use parser::{ColumnBinding, Extraction, RecordExtractor};

use crate::error::ExtractionError;
use crate::layout::TokenizedDocument;
use crate::templates::Template;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Trait for statement record extractors.
pub trait StatementExtractor {
    /// Extract typed records from tokenized rows using the selected template.
    fn extract(&self, document: &TokenizedDocument, template: &Template) -> Result<Extraction>;
}
