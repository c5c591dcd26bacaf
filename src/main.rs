mod doctor;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taxflow_core::config::AppConfig;
use taxflow_rules::{validate_batch, BatchRequest, TaxValidator, ValidationReport};

#[derive(Parser)]
#[command(name = "taxflow", version, about = "Tax validation workflow engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "taxflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one transaction and print the report
    Validate {
        /// JSON file with the transaction fields
        subject: PathBuf,
        /// JSON file with per-run context (rate table, tolerance, defaults)
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Validate one transaction and print a plain-English summary
    Explain {
        subject: PathBuf,
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Validate a batch file of the form {"items": [{"tx": .., "ctx": ..}]}
    Batch {
        items: PathBuf,
    },
    /// Walk through a passing and a remediated transaction
    Demo,
    /// Print the wired steps and edges
    Graph,
    /// Show current configuration
    Config,
    /// Run configuration health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taxflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "taxflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Validate { subject, context } => {
            let validator = TaxValidator::new(config)?;
            let report = validate_file(&validator, &subject, context.as_deref())?;
            print_json(&report)?;
        }
        Commands::Explain { subject, context } => {
            let validator = TaxValidator::new(config)?;
            let report = validate_file(&validator, &subject, context.as_deref())?;
            println!("{}", report.explain());
        }
        Commands::Batch { items } => {
            let validator = TaxValidator::new(config)?;
            let request: BatchRequest = serde_json::from_value(read_json(&items)?)
                .with_context(|| format!("{} is not a batch request", items.display()))?;
            let report = validate_batch(&validator, request.items).await;
            print_json(&report)?;
        }
        Commands::Demo => {
            let validator = TaxValidator::new(config)?;
            run_demo(&validator)?;
        }
        Commands::Graph => {
            let validator = TaxValidator::new(config)?;
            for line in validator.graph().describe() {
                println!("{}", line);
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Doctor => {
            println!("Taxflow Doctor");
            println!("==============");
            println!();
            doctor::run_doctor(&config);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn validate_file(
    validator: &TaxValidator,
    subject: &Path,
    context: Option<&Path>,
) -> anyhow::Result<ValidationReport> {
    let subject = read_json(subject)?;
    let context = context.map(read_json).transpose()?;
    Ok(validator.validate_value(subject, context)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_demo(validator: &TaxValidator) -> anyhow::Result<()> {
    let context = json!({"rate_table": {"DE": 0.19}, "tolerance": 0.01});

    println!("--- Complete invoice ---");
    let subject = json!({
        "entity_id": "DE01",
        "country": "DE",
        "net_amount": 1000,
        "supplier_tax": 190,
        "ship_to_country": "DE",
        "supplier_country": "DE",
        "doc_date": "2025-10-13",
        "currency": "EUR",
        "supplier_id": "S1",
    });
    let report = validator.validate_value(subject, Some(context.clone()))?;
    print_demo(&report);

    println!();
    println!("--- Invoice missing mandatory fields ---");
    let subject = json!({
        "id": "TX999",
        "entity_id": "DE01",
        "country": "DE",
        "ship_to_country": "DE",
        "supplier_country": "DE",
        "supplier_tax": 190.0,
    });
    let mut context = context;
    context["defaults"] = json!({"net_amount": 1000.0, "supplier_tax": 190.0});
    let report = validator.validate_value(subject, Some(context))?;
    print_demo(&report);

    info!("Demo complete");
    Ok(())
}

fn print_demo(report: &ValidationReport) {
    println!("Trail: {}", report.trail.join(" -> "));
    for message in &report.messages {
        println!("  {}", message.content);
    }
    println!("{}", report.explain());
}
