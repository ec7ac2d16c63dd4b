//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use tracing::debug;

use stmtconv_core::{Converter, StmtConfig};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Summarize the effective configuration
    Show {
        /// Print the full configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "layout.row_tolerance")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show where the config and extra templates are read from
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Where to write the config (default: the user config directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with extra statement templates to load on every run
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Replace an existing config
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { json } => show_config(config_path, json),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Get { key } => get_config(&key),
        ConfigCommand::Set { key, value } => set_config(&key, &value),
        ConfigCommand::Path => show_path(config_path),
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stmtconv")
        .join("config.json")
}

/// The explicit config file, else the default one if present, else defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<StmtConfig> {
    if let Some(path) = path {
        return Ok(StmtConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config {}", default_path.display());
        Ok(StmtConfig::from_file(&default_path)?)
    } else {
        Ok(StmtConfig::default())
    }
}

/// Where the effective config comes from.
fn config_source(path: Option<&str>) -> (PathBuf, bool) {
    match path {
        Some(path) => (PathBuf::from(path), true),
        None => {
            let default_path = default_config_path();
            let exists = default_path.exists();
            (default_path, exists)
        }
    }
}

fn limit(value: u64, unit: &str) -> String {
    if value == 0 {
        "unlimited".to_string()
    } else {
        format!("{} {}", value, unit)
    }
}

/// The settings that change conversion results, one labelled line each.
fn summary(config: &StmtConfig, templates: usize) -> Vec<(&'static str, String)> {
    let loader = &config.loader;
    let layout = &config.layout;
    let classifier = &config.classifier;
    let output = &config.output;

    let extra_templates = match &classifier.templates_file {
        Some(path) => format!("{} ({} templates in total)", path.display(), templates),
        None => format!("none ({} built-in templates)", templates),
    };
    let timeout = match loader.processing_timeout_secs {
        0 => "disabled".to_string(),
        secs => format!("{}s per document", secs),
    };

    vec![
        ("Document size", limit(loader.max_document_bytes, "bytes")),
        ("Pages", limit(loader.max_pages as u64, "pages")),
        ("Timeout", timeout),
        (
            "Rows",
            format!(
                "±{}pt bands, continuation gap {}pt, joined with {:?}",
                layout.row_tolerance, layout.continuation_max_gap, layout.continuation_separator
            ),
        ),
        (
            "Columns",
            format!(
                "±{}pt, at least {}, header within {} rows",
                layout.column_tolerance, layout.min_columns, layout.header_search_rows
            ),
        ),
        (
            "Classifier",
            format!(
                "{} header rows, min score {}, fuzzy match {}",
                classifier.header_rows, classifier.min_score, classifier.fuzzy_threshold
            ),
        ),
        ("Extra templates", extra_templates),
        ("Balance tolerance", config.extraction.balance_tolerance.to_string()),
        (
            "CSV",
            format!(
                "{} quoting, {:?} endings, delimiter {:?}, dates {}",
                if output.quote_all { "all-field" } else { "minimal" },
                output.line_terminator,
                output.delimiter,
                output.date_format
            ),
        ),
    ]
}

fn show_config(config_path: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let (path, exists) = config_source(config_path);
    let source = if exists {
        path.display().to_string()
    } else {
        "built-in defaults".to_string()
    };
    let templates = Converter::from_config(config.clone())?.registry().len();

    println!("{} {}", style("Config:").bold(), source);
    for (label, value) in summary(&config, templates) {
        println!("  {:<18} {}", label, value);
    }

    Ok(())
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            output_path.display()
        );
    }

    let mut config = StmtConfig::default();
    if let Some(templates) = args.templates {
        config.classifier.templates_file = Some(templates);
    }
    // Refuse a templates file that would break every later run.
    let templates = Converter::from_config(config.clone())?.registry().len();

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(&output_path)?;

    println!(
        "{} Wrote {} ({} templates available)",
        style("✓").green(),
        output_path.display(),
        templates
    );

    Ok(())
}

/// Look up a dotted key in the JSON form of the config.
fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> anyhow::Result<&'a serde_json::Value> {
    key.split('.').try_fold(json, |current, part| {
        current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

fn get_config(key: &str) -> anyhow::Result<()> {
    let config = load_config(None)?;
    let json = serde_json::to_value(&config)?;

    println!("{}", serde_json::to_string_pretty(lookup(&json, key)?)?);

    Ok(())
}

/// Set a dotted key, keeping the result a valid [`StmtConfig`].
fn apply_setting(config: &StmtConfig, key: &str, value: &str) -> anyhow::Result<StmtConfig> {
    let parsed_value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut json = serde_json::to_value(config)?;
    let (parent, last) = match key.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, key),
    };

    let mut current = &mut json;
    if let Some(parent) = parent {
        for part in parent.split('.') {
            current = current
                .get_mut(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;
        }
    }

    let Some(object) = current.as_object_mut() else {
        anyhow::bail!("Cannot set value at non-object path");
    };
    if !object.contains_key(last) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    object.insert(last.to_string(), parsed_value);

    Ok(serde_json::from_value(json)?)
}

fn set_config(key: &str, value: &str) -> anyhow::Result<()> {
    let config_path = default_config_path();
    let config = load_config(None)?;

    let updated = apply_setting(&config, key, value)?;
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    updated.save(&config_path)?;

    let json = serde_json::to_value(&updated)?;
    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(lookup(&json, key)?)?
    );

    Ok(())
}

fn show_path(config_path: Option<&str>) -> anyhow::Result<()> {
    let (path, exists) = config_source(config_path);

    if exists {
        println!("Config: {}", path.display());
    } else {
        println!("Config: {} ({})", path.display(), style("not created").yellow());
        println!("Run 'stmtconv config init' to write the defaults there.");
        return Ok(());
    }

    let config = StmtConfig::from_file(&path)?;
    match &config.classifier.templates_file {
        Some(templates) if templates.exists() => println!("Templates: {}", templates.display()),
        Some(templates) => println!("Templates: {} ({})", templates.display(), style("missing").red()),
        None => println!("Templates: built-in only"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting() {
        let config = StmtConfig::default();
        let updated = apply_setting(&config, "output.quote_all", "true").unwrap();
        assert!(updated.output.quote_all);

        let updated = apply_setting(&config, "output.line_terminator", "lf").unwrap();
        assert_eq!(updated.output.line_terminator, stmtconv_core::models::config::LineTerminator::Lf);
    }

    #[test]
    fn test_apply_setting_rejects_unknown_keys() {
        let config = StmtConfig::default();
        assert!(apply_setting(&config, "output.nope", "1").is_err());
        assert!(apply_setting(&config, "layout.row_tolerance", "\"wide\"").is_err());
    }

    #[test]
    fn test_lookup() {
        let json = serde_json::to_value(StmtConfig::default()).unwrap();
        assert_eq!(lookup(&json, "classifier.header_rows").unwrap(), &serde_json::json!(15));
        assert!(lookup(&json, "classifier.missing").is_err());
    }

    #[test]
    fn test_summary_reports_limits_and_templates() {
        let mut config = StmtConfig::default();
        config.loader.processing_timeout_secs = 0;
        config.loader.max_pages = 0;
        config.output.quote_all = true;

        let lines = summary(&config, 3);
        let get = |label: &str| lines.iter().find(|(l, _)| *l == label).map(|(_, v)| v.clone()).unwrap();

        assert_eq!(get("Timeout"), "disabled");
        assert_eq!(get("Pages"), "unlimited");
        assert_eq!(get("Extra templates"), "none (3 built-in templates)");
        assert!(get("CSV").starts_with("all-field quoting, Crlf endings"));
    }
}
