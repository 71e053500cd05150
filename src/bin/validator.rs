//! JSON corpus validator CLI
//!
//! Builds the schema registry, validates every document under the document
//! root, and prints a per-file status plus a final summary.
//!
//! Exit codes: 0 = every document valid, 1 = at least one failure,
//! 2 = the schema corpus itself is broken (or the configuration is).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use json_validator::{loader, DocumentStatus, Runner, SchemaRegistry, ValidatorConfig};

#[derive(Parser)]
#[command(name = "json-validator")]
#[command(about = "Validate JSON documents against a draft-04 schema registry")]
struct Cli {
    /// Path to a config file (validator.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Schema directory (overrides config)
    #[arg(long)]
    schema_root: Option<PathBuf>,

    /// Document directory (overrides config)
    #[arg(long)]
    document_root: Option<PathBuf>,

    /// Base authority URI (overrides config)
    #[arg(long)]
    base_uri: Option<String>,

    /// Write a JSON report to this file
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Validate documents sequentially instead of in parallel
    #[arg(long)]
    sequential: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(all_valid) => {
            if all_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = ValidatorConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(schema_root) = cli.schema_root {
        config.schema_root = schema_root;
    }
    if let Some(document_root) = cli.document_root {
        config.document_root = document_root;
    }
    if let Some(base_uri) = cli.base_uri {
        config.base_uri = base_uri;
    }

    let base = config
        .base_url()
        .with_context(|| format!("invalid base URI {}", config.base_uri))?;

    let meta = json_validator::load_meta_schema()?;
    let registry = SchemaRegistry::build(&config.schema_root_path(), &meta)
        .context("failed to build schema registry")?;

    println!("Registry initialized with the following schemas:");
    for uri in registry.uris() {
        println!("  {}", uri);
    }
    println!();

    println!("Validating documents");
    let paths = loader::find_json_files(&config.document_root_path());
    let runner = Runner::new(&registry, base);
    let summary = if cli.sequential {
        runner.run_sequential(&paths)
    } else {
        runner.run(&paths)
    };

    for result in &summary.results {
        let label = match &result.status {
            DocumentStatus::Valid => "Valid  ",
            DocumentStatus::Invalid(_) => "Invalid",
            DocumentStatus::Failed(_) => "Failed ",
        };
        println!("  {} : {}", label, result.path.display());
        match &result.status {
            DocumentStatus::Invalid(errors) => {
                for error in errors {
                    println!("      - {}", error);
                }
            }
            DocumentStatus::Failed(err) => {
                println!("      - {}", err);
            }
            DocumentStatus::Valid => {}
        }
    }

    println!();
    if summary.is_success() {
        println!("No invalid documents found!");
    } else {
        println!(
            "{} of {} documents failed:",
            summary.failure_count(),
            summary.total()
        );
        for (kind, count) in &summary.tally {
            println!("  {:<20} {}", kind, count);
        }
    }

    if let Some(path) = cli.report {
        let report = build_report(&summary);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(summary.is_success())
}

fn build_report(summary: &json_validator::RunSummary) -> serde_json::Value {
    let results: Vec<serde_json::Value> = summary
        .results
        .iter()
        .map(|result| {
            let (status, detail) = match &result.status {
                DocumentStatus::Valid => ("valid", serde_json::Value::Null),
                DocumentStatus::Invalid(errors) => ("invalid", serde_json::json!(errors)),
                DocumentStatus::Failed(err) => {
                    ("failed", serde_json::json!({ "kind": err.kind(), "message": err.to_string() }))
                }
            };
            serde_json::json!({
                "path": result.path.display().to_string(),
                "status": status,
                "detail": detail,
            })
        })
        .collect();

    serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "total": summary.total(),
        "valid": summary.valid_count(),
        "failures": summary.tally,
        "results": results,
    })
}
