//! Batch command - convert many statement PDFs concurrently.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use stmtconv_core::{Conversion, ConversionFailure, Converter};

use super::convert::render;
use super::{
    OutputFormat, load_converter, output_file_name, read_document, run_conversion, unique_output_path,
};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input PDFs
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Restrict classification to one statement kind
    #[arg(short, long)]
    kind: Option<String>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of one file.
struct FileResult {
    path: PathBuf,
    outcome: Result<Conversion, String>,
    output: Option<PathBuf>,
    processing_time_ms: u64,
}

async fn convert_file(
    converter: Arc<Converter>,
    path: PathBuf,
    kind: Option<String>,
    timeout: u64,
) -> Result<Conversion, String> {
    let bytes = read_document(&path, converter.config()).map_err(|e| e.to_string())?;
    run_conversion(converter, bytes, kind, timeout)
        .await
        .map_err(|failure: ConversionFailure| failure.to_string())
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let converter = Arc::new(load_converter(config_path)?);
    let timeout = converter.config().loader.processing_timeout_secs;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let semaphore = Arc::clone(&semaphore);
        let converter = Arc::clone(&converter);
        let kind = args.kind.clone();
        let pb = overall_pb.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let file_start = Instant::now();
            let outcome = convert_file(converter, path.clone(), kind, timeout).await;
            pb.inc(1);
            FileResult {
                path,
                outcome,
                output: None,
                processing_time_ms: file_start.elapsed().as_millis() as u64,
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await?);
    }
    overall_pb.finish_with_message("Complete");

    let processed_at = chrono::Local::now().naive_local();
    let mut taken = HashSet::new();
    for result in &mut results {
        match &result.outcome {
            Ok(conversion) => {
                let name = output_file_name(&result.path, processed_at, args.format);
                let output_path = unique_output_path(&output_dir, &name, &mut taken);
                fs::write(&output_path, render(conversion, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
                result.output = Some(output_path);
            }
            Err(message) if args.continue_on_error => {
                warn!("Failed to process {}: {}", result.path.display(), message);
            }
            Err(message) => {
                error!("Failed to process {}: {}", result.path.display(), message);
                anyhow::bail!("Processing failed for {}: {}", result.path.display(), message);
            }
        }
    }

    if args.summary {
        let summary_path = output_dir.join("summary.csv");
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&FileResult> = results.iter().filter(|r| r.outcome.is_err()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            if let Err(message) = &result.outcome {
                println!("  - {}: {}", result.path.display(), message);
            }
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "template",
        "records",
        "warnings",
        "output",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let time = result.processing_time_ms.to_string();

        match &result.outcome {
            Ok(conversion) => {
                let output = result
                    .output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let records = conversion.records.len().to_string();
                let warnings = conversion.warnings.len().to_string();
                wtr.write_record([
                    filename,
                    "success",
                    conversion.template.as_str(),
                    records.as_str(),
                    warnings.as_str(),
                    output.as_str(),
                    time.as_str(),
                    "",
                ])?;
            }
            Err(message) => {
                wtr.write_record([filename, "error", "", "", "", "", time.as_str(), message.as_str()])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
