//! Templates command - inspect the statement template registry.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use super::load_converter;

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List available templates in classification order
    List,

    /// Print one template as JSON
    Show {
        /// Template name
        name: String,
    },

    /// Write every template as a JSON array
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let converter = load_converter(config_path)?;
    let registry = converter.registry();

    match args.command {
        TemplatesCommand::List => {
            for template in registry.iter() {
                println!(
                    "{}  [{}] needs {}/{} keywords",
                    style(&template.name).bold(),
                    template.kind,
                    template.min_matches,
                    template.keywords.len()
                );
                if !template.description.is_empty() {
                    println!("    {}", template.description);
                }
            }
        }
        TemplatesCommand::Show { name } => {
            let Some(template) = registry.get(&name) else {
                anyhow::bail!("Unknown template: {}", name);
            };
            println!("{}", serde_json::to_string_pretty(template)?);
        }
        TemplatesCommand::Export { output } => {
            let json = registry.to_json()?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    println!(
                        "{} Exported {} templates to {}",
                        style("✓").green(),
                        registry.len(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
