use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledgerlens_core::{
    AnalysisJob, Category, Insight, JobStatus, Prediction, Transaction, CATEGORY_VOCABULARY_VERSION,
};
use ledgerlens_finance::Pipeline;
use ledgerlens_ingest::{parse, FileFormat};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerlens",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LEDGERLENS_BUILD_SHA"), ")"),
    about = "Categorize transaction statements and surface spending insights"
)]
struct Cli {
    /// Config file (default: ~/.ledgerlens/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline on a CSV / Excel statement and print the results
    Analyze {
        /// Statement file (.csv, .xls, .xlsx)
        file: PathBuf,

        /// Print a JSON document instead of the text report
        #[arg(long)]
        json: bool,

        /// Use offline keyword rules even if an API key is configured
        #[arg(long)]
        keywords: bool,
    },

    /// Parse a statement and print the normalized transactions (no categorization)
    Parse {
        file: PathBuf,
    },

    /// List the category vocabulary
    Categories,

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Serialize)]
struct Report<'a> {
    job: &'a AnalysisJob,
    transactions: &'a [Transaction],
    insights: &'a [Insight],
    predictions: &'a [Prediction],
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze {
            file,
            json,
            keywords,
        } => {
            let mut cfg = config::load_config(cli.config.as_deref())?;
            if keywords {
                cfg.classifier.provider = "keywords".to_string();
            }
            analyze(&cfg, file, json).await?;
        }

        Command::Parse { file } => {
            let (name, bytes) = state::read_upload(&file)?;
            let format = FileFormat::from_filename(&name)?;
            let txns = parse(&bytes, format)
                .with_context(|| format!("parsing {}", file.display()))?;

            println!("Parsed {} transactions from {}\n", txns.len(), file.display());
            for t in &txns {
                println!("{} | {} | {:>10.2} | {}", t.id, t.date, t.amount, t.description);
            }
        }

        Command::Categories => {
            println!("Category vocabulary v{}\n", CATEGORY_VOCABULARY_VERSION);
            for c in Category::ALL {
                println!("- {}", c);
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(cli.config.as_deref())?,
            ConfigCommand::Show => {
                let cfg = config::load_config(cli.config.as_deref())?;
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "ledgerlens=debug" } else { "ledgerlens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn analyze(cfg: &config::Config, file: PathBuf, json: bool) -> Result<()> {
    let (name, bytes) = state::read_upload(&file)?;

    let classifier = cfg.build_classifier(std::env::var(config::API_KEY_ENV).ok())?;
    let pipeline = Pipeline::new(classifier, cfg.pipeline_config());

    let id = pipeline.submit_file(&name, bytes)?;
    info!(job_id = %id, file = %file.display(), "submitted");

    let job = pipeline.wait(&id, cfg.poll_interval()).await?;
    if job.status == JobStatus::Failed {
        bail!(
            "analysis of {} failed: {}",
            file.display(),
            job.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    let transactions = pipeline.categorized_transactions(&id)?;
    let insights = pipeline.insights(&id)?;
    let predictions = pipeline.predictions(&id)?;

    if json {
        let report = Report {
            job: &job,
            transactions: &transactions,
            insights: &insights,
            predictions: &predictions,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Job {} ({})", job.job_id, job.status);
    println!("Analyzed {} transactions from {}\n", transactions.len(), file.display());

    println!("## Transactions\n");
    for t in &transactions {
        println!(
            "{} | {:<13} | {:>10.2} | {}",
            t.date, t.category, t.amount, t.description
        );
    }

    println!("\n## Insights\n");
    if insights.is_empty() {
        println!("(none)");
    }
    for i in &insights {
        println!("- [{:?}] {}: {}", i.kind, i.title, i.description);
    }

    println!("\n## Predictions\n");
    if predictions.is_empty() {
        println!("(no transactions this month)");
    }
    for p in &predictions {
        println!(
            "- {}: ${:.2} (confidence {:.2})",
            p.period, p.predicted_amount, p.confidence_score
        );
    }

    Ok(())
}
