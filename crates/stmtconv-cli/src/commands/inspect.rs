//! Inspect command - show what the pipeline sees in a PDF.

use std::path::PathBuf;

use clap::Args;
use console::style;

use stmtconv_core::layout::RowKind;

use super::{load_converter, read_document};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// List positioned text fragments
    #[arg(long)]
    fragments: bool,

    /// List tokenized rows with their cells
    #[arg(long)]
    rows: bool,

    /// Restrict classification to one statement kind
    #[arg(short, long)]
    kind: Option<String>,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let converter = load_converter(config_path)?;
    let bytes = read_document(&args.input, converter.config())?;

    let (fragments, document) = converter
        .tokenize(&bytes)
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.kind()))?;

    println!(
        "{} {} pages, {} fragments, {} rows",
        style("ℹ").blue(),
        fragments.page_count(),
        fragments.fragment_count(),
        document.rows.len()
    );
    match &document.header {
        Some(header) => println!("Header: {}", header.join(" | ")),
        None => println!("Header: {}", style("none").yellow()),
    }
    for (page, layout) in document.layouts.iter().enumerate() {
        if let Some(layout) = layout {
            println!(
                "Page {}: {} columns from {:?} at {:?}",
                page + 1,
                layout.len(),
                layout.source,
                layout.starts
            );
        }
    }

    if args.fragments {
        println!();
        println!("{}", style("Fragments:").bold());
        for (page, items) in fragments.pages.iter().enumerate() {
            for fragment in items {
                println!(
                    "  p{} [{:>7.1} {:>7.1} {:>7.1} {:>7.1}] {:>4.1}pt  {}",
                    page + 1,
                    fragment.bbox.x0,
                    fragment.bbox.y0,
                    fragment.bbox.x1,
                    fragment.bbox.y1,
                    fragment.font_size,
                    fragment.text
                );
            }
        }
    }

    if args.rows {
        println!();
        println!("{}", style("Rows:").bold());
        for row in &document.rows {
            let kind = match row.kind {
                RowKind::Preamble => style("preamble").dim(),
                RowKind::Header => style("header").cyan(),
                RowKind::Body => style("body").green(),
            };
            let cells: Vec<&str> = row.cells.iter().map(|c| c.text.as_str()).collect();
            let wrapped = if row.continuation_lines > 0 {
                format!(" (+{} lines)", row.continuation_lines)
            } else {
                String::new()
            };
            println!("  {:>4} p{} {:<8}{} {}", row.index, row.page + 1, kind, wrapped, cells.join(" | "));
        }
    }

    println!();
    println!("{}", style("Templates:").bold());
    let scores = converter
        .scores(&document, args.kind.as_deref())
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.kind()))?;
    for score in &scores {
        let status = if score.qualified {
            style("qualified").green()
        } else {
            style("rejected").red()
        };
        println!(
            "  {:<24} {:<15} {}/{} keywords (needs {})  {}",
            score.template,
            score.kind,
            score.matched.len(),
            score.keywords,
            score.min_matches,
            status
        );
        if !score.matched.is_empty() {
            println!("      matched: {}", score.matched.join(", "));
        }
    }

    Ok(())
}
