//! End-to-end conversion: PDF bytes in, CSV out.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{Classifier, TemplateScore};
use crate::emit::CsvEmitter;
use crate::error::{ErrorKind, Result, Stage, StmtError};
use crate::extract::{RecordExtractor, StatementExtractor};
use crate::layout::{LayoutTokenizer, TokenizedDocument};
use crate::models::config::StmtConfig;
use crate::models::document::PageFragments;
use crate::models::record::{Field, Record, Warning};
use crate::normalize::Normalizer;
use crate::pdf::load_document;
use crate::templates::{StatementKind, TemplateRegistry};

/// A successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// RFC 4180 CSV, header row first.
    pub csv: String,
    pub records: Vec<Record>,
    pub warnings: Vec<Warning>,
    /// Name of the selected template.
    pub template: String,
    pub kind: StatementKind,
    /// Statement header values (IBAN, period, holder).
    pub metadata: BTreeMap<String, String>,
    pub opening_balance: Option<Decimal>,
    pub pages: usize,
}

impl Conversion {
    /// Warnings rendered for display.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }

    /// Transaction records, without the opening balance row.
    pub fn transaction_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.get(Field::Date).is_empty())
            .count()
    }
}

/// A failed conversion, reduced to the caller-facing taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFailure {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub message: String,
}

impl ConversionFailure {
    /// The caller's deadline expired before the pipeline finished.
    pub fn timeout(seconds: u64) -> Self {
        StmtError::Timeout(seconds).into()
    }
}

impl From<StmtError> for ConversionFailure {
    fn from(err: StmtError) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.stage, self.message)
    }
}

impl std::error::Error for ConversionFailure {}

pub type ConversionResult = std::result::Result<Conversion, ConversionFailure>;

/// A configured pipeline. Immutable, so one instance can serve many threads.
#[derive(Debug, Clone)]
pub struct Converter {
    config: StmtConfig,
    registry: TemplateRegistry,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(StmtConfig::default(), TemplateRegistry::builtin())
    }
}

impl Converter {
    pub fn new(config: StmtConfig, registry: TemplateRegistry) -> Self {
        Self { config, registry }
    }

    /// Built-in templates plus those from `classifier.templates_file`.
    pub fn from_config(config: StmtConfig) -> Result<Self> {
        let mut registry = TemplateRegistry::builtin();
        if let Some(path) = &config.classifier.templates_file {
            let added = registry.load_file(path)?;
            info!("Loaded {} templates from {}", added, path.display());
        }
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &StmtConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Load and tokenize without classifying.
    pub fn tokenize(&self, bytes: &[u8]) -> Result<(PageFragments, TokenizedDocument)> {
        let fragments = load_document(bytes, &self.config.loader)?;
        let document = LayoutTokenizer::new(self.config.layout.clone()).tokenize(&fragments)?;
        Ok((fragments, document))
    }

    /// Classification scores for every candidate template.
    pub fn scores(&self, document: &TokenizedDocument, hint_kind: Option<&str>) -> Result<Vec<TemplateScore>> {
        let classifier = Classifier::new(self.config.classifier.clone());
        Ok(classifier.scores(document, &self.registry, hint_kind)?)
    }

    pub fn convert(&self, bytes: &[u8], hint_kind: Option<&str>) -> ConversionResult {
        self.run(bytes, hint_kind).map_err(|err| {
            debug!("Conversion failed at {}: {}", err.stage(), err);
            ConversionFailure::from(err)
        })
    }

    fn run(&self, bytes: &[u8], hint_kind: Option<&str>) -> Result<Conversion> {
        let (fragments, document) = self.tokenize(bytes)?;
        debug!(
            "Tokenized {} fragments into {} rows",
            fragments.fragment_count(),
            document.rows.len()
        );

        let classification = Classifier::new(self.config.classifier.clone()).classify(
            &document,
            &self.registry,
            hint_kind,
        )?;
        let template = classification.template;

        let extraction = RecordExtractor::new(self.config.extraction.clone()).extract(&document, template)?;
        let mut records = extraction.records;
        Normalizer::new(template).normalize(&mut records)?;
        let csv = CsvEmitter::new(self.config.output.clone()).emit(&records, template)?;

        info!(
            "Converted {} pages with template {}: {} records, {} warnings",
            fragments.page_count(),
            template.name,
            records.len(),
            extraction.warnings.len()
        );

        Ok(Conversion {
            csv,
            records,
            warnings: extraction.warnings,
            template: template.name.clone(),
            kind: template.kind,
            metadata: extraction.metadata,
            opening_balance: extraction.opening_balance,
            pages: fragments.page_count(),
        })
    }
}

/// Convert with the default configuration and the built-in templates.
pub fn convert(bytes: &[u8], hint_kind: Option<&str>) -> ConversionResult {
    Converter::default().convert(bytes, hint_kind)
}
