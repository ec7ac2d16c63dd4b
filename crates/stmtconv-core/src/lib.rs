//! Core library for converting bank statement and POS settlement PDFs to CSV.
//!
//! This crate provides:
//! - Positioned text extraction from PDF content streams
//! - Layout tokenization into rows and columns, with wrapped-cell merging
//! - Statement format classification against a data-driven template registry
//! - Typed field extraction with balance cross-checking
//! - Normalization and deterministic RFC 4180 CSV output
//!
//! The whole pipeline is reachable through [`convert`] or a configured
//! [`Converter`].

pub mod classify;
pub mod convert;
pub mod emit;
pub mod error;
pub mod extract;
pub mod layout;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod templates;
pub mod text;

pub use convert::{convert, Conversion, ConversionFailure, ConversionResult, Converter};
pub use error::{ErrorKind, Result, Stage, StmtError};
pub use models::config::StmtConfig;
pub use models::document::{BBox, RawFragment};
pub use models::record::{Field, FieldValue, Record, Warning};
pub use templates::{StatementKind, Template, TemplateRegistry};
