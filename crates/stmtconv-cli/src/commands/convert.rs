//! Convert command - turn a single statement PDF into CSV.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use stmtconv_core::Conversion;

use super::{OutputFormat, load_converter, output_file_name, read_document, run_conversion};

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output file, or "-" for stdout (default: <name>_<timestamp>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Restrict classification to one statement kind (bank_statement, pos)
    #[arg(short, long)]
    kind: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Processing deadline in seconds (0 disables it; default from config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Print data-quality warnings
    #[arg(long)]
    show_warnings: bool,
}

pub fn render(conversion: &Conversion, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Csv => Ok(conversion.csv.clone()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(conversion)?),
    }
}

pub async fn run(args: ConvertArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let converter = load_converter(config_path)?;
    let timeout = args
        .timeout
        .unwrap_or(converter.config().loader.processing_timeout_secs);

    let bytes = read_document(&args.input, converter.config())?;
    info!("Converting {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Converting {}...", args.input.display()));

    let result = run_conversion(Arc::new(converter), bytes, args.kind.clone(), timeout).await;
    pb.finish_and_clear();

    let conversion = match result {
        Ok(conversion) => conversion,
        Err(failure) => {
            anyhow::bail!("Conversion of {} failed: {}", args.input.display(), failure);
        }
    };

    let output = render(&conversion, args.format)?;
    let to_stdout = args.output.as_deref().is_some_and(|p| p.as_os_str() == "-");

    if to_stdout {
        print!("{}", output);
    } else {
        let output_path = args.output.clone().unwrap_or_else(|| {
            PathBuf::from(output_file_name(
                &args.input,
                chrono::Local::now().naive_local(),
                args.format,
            ))
        });
        fs::write(&output_path, &output)?;
        println!(
            "{} {} records ({}) written to {}",
            style("✓").green(),
            conversion.records.len(),
            conversion.template,
            output_path.display()
        );
    }

    if !conversion.warnings.is_empty() {
        if args.show_warnings {
            eprintln!("{}", style("Warnings:").yellow());
            for message in conversion.warning_messages() {
                eprintln!("  - {}", message);
            }
        } else {
            eprintln!(
                "{} {} warnings (use --show-warnings to list them)",
                style("!").yellow(),
                conversion.warnings.len()
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
