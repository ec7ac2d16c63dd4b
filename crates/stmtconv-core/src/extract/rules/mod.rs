//! Rule-based cell parsers for statement rows.

pub mod amounts;
pub mod dates;
pub mod parties;
pub mod patterns;

pub use amounts::AmountParser;
pub use dates::DateParser;
pub use parties::{extract_beneficiary, extract_by_order_of, PartyExtractor, PartyRole};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}
