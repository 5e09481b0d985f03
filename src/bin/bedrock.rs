//! Bedrock Schemas CLI
//!
//! Runs diagnostics, hover and completion on add-on files from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use bedrock_schemas::{AssistConfig, AssistService, DiagnosticCollection, Severity, SourceDocument};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bedrock-schemas")]
#[command(about = "Schema-driven checks and lookups for Bedrock add-on files")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate files and print their diagnostics
    Check {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the hover panel at a byte offset
    Hover {
        file: PathBuf,
        #[arg(short, long)]
        offset: usize,
    },

    /// List completions at a byte offset
    Complete {
        file: PathBuf,
        #[arg(short, long)]
        offset: usize,
        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered schema types and their file patterns
    Schemas,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn read(file: &Path) -> anyhow::Result<(String, String)> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    Ok((file.display().to_string(), text))
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.as_ref().map(|p| p.display().to_string());
    let config = AssistConfig::load_from(config_path.as_deref()).context("loading configuration")?;

    let mut service = AssistService::from_config(config).context("building schema registry")?;

    match cli.command {
        Commands::Check { files } => {
            let mut collection = DiagnosticCollection::new();
            let mut errors = 0;

            for file in &files {
                let (path, text) = read(file)?;
                let doc = SourceDocument::new(path.clone(), 0, text);
                service.diagnostics().validate_now(&doc, &mut collection);

                let diagnostics = collection.get(&path).unwrap_or_default();
                if diagnostics.is_empty() {
                    println!("✅ {}", path);
                    continue;
                }
                println!("❌ {}", path);
                for diagnostic in diagnostics {
                    println!("   {}", diagnostic);
                    if diagnostic.severity == Severity::Error {
                        errors += 1;
                    }
                }
            }

            println!();
            if errors > 0 {
                println!("{} error(s) in {} file(s)", errors, files.len());
                return Ok(ExitCode::FAILURE);
            }
            println!("No errors in {} file(s)", files.len());
        }

        Commands::Hover { file, offset } => {
            let (path, text) = read(&file)?;
            match service.hover(&path, &text, offset) {
                Some(hover) => println!("{}", hover.contents),
                None => println!("No schema information at offset {}", offset),
            }
        }

        Commands::Complete { file, offset, json } => {
            let (path, text) = read(&file)?;
            let items = service.complete(&path, &text, offset);
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    println!(
                        "{:<40} {:?} {}",
                        item.label,
                        item.kind,
                        item.detail.as_deref().unwrap_or_default()
                    );
                }
            }
        }

        Commands::Schemas => {
            for schema_type in service.registry().schema_types() {
                println!("{:<20} {}", schema_type.name, schema_type.file_match.join(", "));
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(service.config())?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
