//! Tribunal batch CLI.
//!
//! ```text
//! tribunal evaluate --input data/agent_responses_to_evaluate.csv
//! tribunal summarize --input final_evaluation_report.json --by agent
//! ```

mod loader;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tribunal_config::Settings;
use tribunal_engine::{evaluable_items, evaluate_batch, filter_reports, summarize, GroupBy, JudgePanel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Grouping {
    Agent,
    Prompt,
}

impl From<Grouping> for GroupBy {
    fn from(g: Grouping) -> Self {
        match g {
            Grouping::Agent => GroupBy::Agent,
            Grouping::Prompt => GroupBy::Prompt,
        }
    }
}

#[derive(Parser)]
#[command(name = "tribunal")]
#[command(about = "Score agent responses for instruction following, hallucination and coherence")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (overrides TRIBUNAL_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every item in a CSV, JSON or DOCX file
    Evaluate {
        /// Input file (.csv, .json or .docx)
        #[arg(short, long, default_value = "data/agent_responses_to_evaluate.csv")]
        input: PathBuf,

        /// Where to write the JSON report
        #[arg(short, long, default_value = "final_evaluation_report.json")]
        output: PathBuf,
    },

    /// Print per-agent or per-prompt metrics for a report file
    Summarize {
        /// Report produced by `evaluate`
        #[arg(short, long, default_value = "final_evaluation_report.json")]
        input: PathBuf,

        /// Grouping
        #[arg(long, value_enum, default_value = "agent")]
        by: Grouping,

        /// Only include these agents (comma-separated)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,

        /// Only include these prompts (comma-separated)
        #[arg(long, value_delimiter = ',')]
        prompts: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()))
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { input, output } => {
            let settings = load_settings(cli.config.as_deref())?;
            run_evaluate(&settings, &input, &output).await
        }
        Commands::Summarize { input, by, agents, prompts, json } => {
            run_summarize(&input, by.into(), &agents, &prompts, json)
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)?.with_env(|key| std::env::var(key).ok()),
        None => Settings::load()?,
    };
    settings.validate()?;
    Ok(settings)
}

async fn run_evaluate(settings: &Settings, input: &Path, output: &Path) -> Result<()> {
    info!("Loading data from {}", input.display());
    let raw = loader::load_items(input).with_context(|| format!("cannot load {}", input.display()))?;
    let items = evaluable_items(raw);

    let panel = JudgePanel::initialize(settings).await;
    let evaluator = panel.evaluator(settings);

    info!("Starting evaluation for {} items", items.len());
    let reports = evaluate_batch(&evaluator, items).await;

    output::write_report(output, &reports)?;
    info!("Evaluation complete. Full report saved to {}", output.display());

    if let Some(preview) = output::preview(&reports)? {
        println!("\n--- Final Report Preview (first record) ---");
        println!("{}", preview);
    }
    Ok(())
}

fn run_summarize(input: &Path, by: GroupBy, agents: &[String], prompts: &[String], json: bool) -> Result<()> {
    let reports = output::read_report(input)?;
    let selected = filter_reports(&reports, agents, prompts);
    if selected.is_empty() {
        warn!("No reports match the given filters");
    }

    let metrics = summarize(selected, by);
    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print!("{}", output::metrics_table(&metrics, by)?);
    }
    Ok(())
}
