//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod convert;
pub mod inspect;
pub mod templates;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use stmtconv_core::{ConversionFailure, ConversionResult, Converter, ErrorKind, Stage, StmtConfig};

/// Output format for converted statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// RFC 4180 CSV
    Csv,
    /// Records, warnings and metadata as JSON
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Build a converter from the config file and its extra templates.
pub fn load_converter(config_path: Option<&str>) -> anyhow::Result<Converter> {
    let config = config::load_config(config_path)?;
    Ok(Converter::from_config(config)?)
}

/// Read a document, refusing files above the configured size.
pub fn read_document(path: &Path, config: &StmtConfig) -> anyhow::Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    let size = fs::metadata(path)?.len();
    let limit = config.loader.max_document_bytes;
    if limit > 0 && size > limit {
        anyhow::bail!(
            "{} is {} bytes, above the {} byte limit",
            path.display(),
            size,
            limit
        );
    }

    Ok(fs::read(path)?)
}

/// Run one conversion on the blocking pool; `timeout_secs` of 0 disables the deadline.
pub async fn run_conversion(
    converter: Arc<Converter>,
    bytes: Vec<u8>,
    kind: Option<String>,
    timeout_secs: u64,
) -> ConversionResult {
    let deadline = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    run_blocking(move || converter.convert(&bytes, kind.as_deref()), deadline).await
}

/// Run `job` on the blocking pool under an optional deadline.
///
/// On expiry the job keeps running detached and its result is dropped.
async fn run_blocking<F>(job: F, deadline: Option<Duration>) -> ConversionResult
where
    F: FnOnce() -> ConversionResult + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);

    let joined = match deadline {
        None => task.await,
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => return Err(ConversionFailure::timeout(limit.as_secs())),
        },
    };

    joined.map_err(|e| ConversionFailure {
        kind: ErrorKind::Internal,
        stage: Stage::Convert,
        message: format!("conversion task failed: {}", e),
    })?
}

/// ASCII alphanumerics only, with every other run collapsed to one `_`.
pub fn clean_file_stem(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// `<clean base name>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn output_file_name(input: &Path, processed_at: NaiveDateTime, format: OutputFormat) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(clean_file_stem)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "statement".to_string());

    format!(
        "{}_{}.{}",
        stem,
        processed_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// `dir/name`, or `dir/<stem>_<n>.<ext>` when that path is already taken
/// in this run or exists on disk.
pub fn unique_output_path(dir: &Path, name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (name, None),
    };

    let mut path = dir.join(name);
    let mut n = 2;
    while taken.contains(&path) || path.exists() {
        let numbered = match extension {
            Some(extension) => format!("{}_{}.{}", stem, n, extension),
            None => format!("{}_{}", stem, n),
        };
        path = dir.join(numbered);
        n += 1;
    }

    taken.insert(path.clone());
    path
}
