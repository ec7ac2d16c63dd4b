//! Configuration structures for the conversion pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the stmtconv pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StmtConfig {
    /// Document loading configuration.
    pub loader: LoaderConfig,

    /// Row/column tokenization thresholds.
    pub layout: LayoutConfig,

    /// Template classification configuration.
    pub classifier: ClassifierConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// CSV output configuration.
    pub output: OutputConfig,
}

/// Document loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Largest accepted document in bytes. Checked by callers before conversion.
    pub max_document_bytes: u64,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,

    /// Caller-enforced processing deadline in seconds.
    pub processing_timeout_secs: u64,

    /// A `TJ` displacement (thousandths of an em) beyond which text is split
    /// into separate fragments.
    pub tj_split_threshold: f32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 20 * 1024 * 1024,
            max_pages: 0,
            processing_timeout_secs: 60,
            tj_split_threshold: 300.0,
        }
    }
}

/// Layout tokenizer thresholds, in PDF points unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Fragments whose vertical centres differ by at most this belong to one row.
    pub row_tolerance: f32,

    /// Horizontal slack when matching x-coordinates to column starts and bands.
    pub column_tolerance: f32,

    /// Neighbouring fragments closer than this fraction of the font size are merged.
    pub word_gap_ratio: f32,

    /// Largest vertical gap between a row and its continuation line.
    pub continuation_max_gap: f32,

    /// Separator inserted between a cell and its continuation text.
    pub continuation_separator: String,

    /// Minimum number of columns for a structure to count.
    pub min_columns: usize,

    /// Number of leading rows per page searched for a header row.
    pub header_search_rows: usize,

    /// Fraction of multi-fragment rows that must share an x-band for it to
    /// become a column when no header row exists.
    pub min_band_support: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            column_tolerance: 4.0,
            word_gap_ratio: 0.4,
            continuation_max_gap: 8.0,
            continuation_separator: " | ".to_string(),
            min_columns: 2,
            header_search_rows: 40,
            min_band_support: 0.25,
        }
    }
}

/// Template classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of leading rows that form the header region.
    pub header_rows: usize,

    /// Minimum matched-keyword ratio for a template to qualify (0.0 - 1.0).
    pub min_score: f64,

    /// Normalized Levenshtein similarity needed for a fuzzy keyword match.
    pub fuzzy_threshold: f64,

    /// Extra templates loaded from a JSON file and appended to the built-ins.
    pub templates_file: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            header_rows: 15,
            min_score: 0.5,
            fuzzy_threshold: 0.85,
            templates_file: None,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Balance differences above this are reported as warnings.
    pub balance_tolerance: rust_decimal::Decimal,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: rust_decimal::Decimal::ZERO,
        }
    }
}

/// Line terminator for CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    Crlf,
    Lf,
}

/// CSV output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Line terminator between records.
    pub line_terminator: LineTerminator,

    /// Quote every field instead of only those that need it.
    pub quote_all: bool,

    /// Field delimiter.
    pub delimiter: char,

    /// Date format for date columns.
    pub date_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            line_terminator: LineTerminator::Crlf,
            quote_all: false,
            delimiter: ',',
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl StmtConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StmtConfig =
            serde_json::from_str(r#"{"layout": {"row_tolerance": 5.0}}"#).unwrap();
        assert_eq!(config.layout.row_tolerance, 5.0);
        assert_eq!(config.layout.min_columns, 2);
        assert_eq!(config.classifier.header_rows, 15);
        assert_eq!(config.output.line_terminator, LineTerminator::Crlf);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = StmtConfig::default();
        config.output.quote_all = true;
        config.save(&path).unwrap();

        let loaded = StmtConfig::from_file(&path).unwrap();
        assert!(loaded.output.quote_all);
        assert_eq!(loaded.loader.max_document_bytes, config.loader.max_document_bytes);
    }
}
