//! Error types for the stmtconv-core library.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for the stmtconv library.
#[derive(Error, Debug)]
pub enum StmtError {
    /// PDF loading error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Row/column structure could not be established.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// No template matched the document.
    #[error("classification error: {0}")]
    Classify(#[from] ClassifyError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Normalization error.
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// CSV serialization error.
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),

    /// The caller's processing deadline expired.
    #[error("processing timed out after {0} seconds")]
    Timeout(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while loading a PDF.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to parse the PDF structure.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Pages exist but none carries extractable text.
    #[error("PDF contains no extractable text")]
    NoText,

    /// A page content stream could not be decoded.
    #[error("failed to decode content of page {page}: {reason}")]
    Content { page: u32, reason: String },
}

/// Errors raised by the layout tokenizer.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// No page yielded a consistent column structure.
    #[error("no consistent column structure found ({0})")]
    NoStructure(String),
}

/// Errors raised by the format classifier.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// No template scored above the threshold.
    #[error("no template matched the document header (best: {best})")]
    NoMatch { best: String },

    /// The kind hint names no known statement kind.
    #[error("unknown statement kind: {0}")]
    UnknownKind(String),

    /// The registry holds no candidate templates.
    #[error("no templates available for kind {0}")]
    NoCandidates(String),
}

/// Errors raised by the field extractor.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Too few rows passed validation.
    #[error("only {valid} of {candidates} rows are valid (minimum {min_rows} rows, ratio {min_ratio})")]
    InsufficientValidRows {
        valid: usize,
        candidates: usize,
        min_rows: usize,
        min_ratio: f64,
    },

    /// A template pattern failed to compile.
    #[error("invalid pattern in template {template}: {reason}")]
    Pattern { template: String, reason: String },
}

/// Errors raised by the normalizer. These indicate a bug upstream.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// A record does not carry the template's output schema.
    #[error("record from row {row} does not match the output schema: {reason}")]
    SchemaMismatch { row: usize, reason: String },
}

/// Errors raised while writing CSV.
#[derive(Error, Debug)]
pub enum EmitError {
    /// CSV writer failure.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to flush the CSV buffer.
    #[error("failed to flush CSV output: {0}")]
    Flush(String),

    /// The configured delimiter is not a single ASCII character.
    #[error("delimiter {0:?} is not ASCII")]
    Delimiter(char),

    /// The configured date format contains an invalid specifier.
    #[error("invalid date format '{0}'")]
    DateFormat(String),
}

/// Failure kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedDocument,
    EmptyDocument,
    UnparsableLayout,
    UnknownFormat,
    InsufficientValidRows,
    ProcessingTimeout,
    /// Programmer error or I/O failure inside the core.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedDocument => "MalformedDocument",
            ErrorKind::EmptyDocument => "EmptyDocument",
            ErrorKind::UnparsableLayout => "UnparsableLayout",
            ErrorKind::UnknownFormat => "UnknownFormat",
            ErrorKind::InsufficientValidRows => "InsufficientValidRows",
            ErrorKind::ProcessingTimeout => "ProcessingTimeout",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage that produced an error or warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Tokenize,
    Classify,
    Extract,
    Normalize,
    Emit,
    /// Outside the pipeline (caller deadline, configuration).
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Tokenize => "tokenize",
            Stage::Classify => "classify",
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Emit => "emit",
            Stage::Convert => "convert",
        };
        f.write_str(name)
    }
}

impl StmtError {
    /// Map the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StmtError::Pdf(PdfError::NoPages | PdfError::NoText) => ErrorKind::EmptyDocument,
            StmtError::Pdf(_) => ErrorKind::MalformedDocument,
            StmtError::Layout(_) => ErrorKind::UnparsableLayout,
            StmtError::Classify(_) => ErrorKind::UnknownFormat,
            StmtError::Extraction(ExtractionError::InsufficientValidRows { .. }) => {
                ErrorKind::InsufficientValidRows
            }
            StmtError::Extraction(_) => ErrorKind::Internal,
            StmtError::Normalize(_) | StmtError::Emit(_) => ErrorKind::Internal,
            StmtError::Timeout(_) => ErrorKind::ProcessingTimeout,
            StmtError::Io(_) | StmtError::Config(_) => ErrorKind::Internal,
        }
    }

    /// The stage that raised the error.
    pub fn stage(&self) -> Stage {
        match self {
            StmtError::Pdf(_) => Stage::Load,
            StmtError::Layout(_) => Stage::Tokenize,
            StmtError::Classify(_) => Stage::Classify,
            StmtError::Extraction(_) => Stage::Extract,
            StmtError::Normalize(_) => Stage::Normalize,
            StmtError::Emit(_) => Stage::Emit,
            StmtError::Timeout(_) | StmtError::Io(_) | StmtError::Config(_) => Stage::Convert,
        }
    }
}

/// Result type for the stmtconv library.
pub type Result<T> = std::result::Result<T, StmtError>;
