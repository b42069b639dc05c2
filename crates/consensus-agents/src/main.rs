use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consensus_agents::analyze::build_fact_scorer;
use consensus_agents::{AnalyzeRequest, AnalyzeResponse, Analyzer, AppConfig};
use evaluation::OverconfidenceScorer;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "consensus-agents", about = "Ask several local models, keep the best answers")]
struct Cli {
    /// Config file (TOML). Falls back to $CONSENSUS_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dispatch a query to every model and print the consensus.
    Analyze {
        query: String,
        /// Fact-check answers against this knowledge-base topic.
        #[arg(long)]
        topic: Option<String>,
        /// Override the configured models (repeatable).
        #[arg(long = "model")]
        models: Vec<String>,
    },
    /// Score one answer against a knowledge-base topic.
    FactScore {
        #[arg(long)]
        topic: String,
        answer: String,
    },
    /// Print the overconfidence penalty of a text.
    Confidence { text: String },
    /// Print JSON Schemas for the analyze request and response.
    Schema,
}

#[derive(Serialize)]
struct ConfidenceOutput {
    penalty: f64,
    score: f64,
    confident_terms: usize,
    hedge_terms: usize,
    word_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            query,
            topic,
            models,
        } => {
            let mut config = AppConfig::resolve(cli.config.as_deref())?;
            if !models.is_empty() {
                config.models = models;
                config.validate()?;
            }
            info!(
                provider = %config.provider.base_url,
                models = ?config.models,
                "consensus-agents starting"
            );

            let analyzer = Analyzer::from_config(&config)?;
            let mut request = AnalyzeRequest::new(query);
            request.topic = topic;
            let response = analyzer
                .analyze(&request)
                .await
                .with_context(|| format!("analyze failed for {:?}", request.query))?;
            print_json(&response)?;
        }
        Command::FactScore { topic, answer } => {
            let config = AppConfig::resolve(cli.config.as_deref())?;
            let scorer = build_fact_scorer(&config)?;
            let report = scorer.evaluate(&answer, &topic).await?;
            print_json(&report)?;
        }
        Command::Confidence { text } => {
            let scorer = OverconfidenceScorer::standard()?;
            let signals = scorer.signals(&text);
            print_json(&ConfidenceOutput {
                penalty: signals.penalty,
                score: scorer.score(&text),
                confident_terms: signals.confident_terms,
                hedge_terms: signals.hedge_terms,
                word_count: signals.word_count,
            })?;
        }
        Command::Schema => {
            let schemas = serde_json::json!({
                "AnalyzeRequest": schemars::schema_for!(AnalyzeRequest),
                "AnalyzeResponse": schemars::schema_for!(AnalyzeResponse),
            });
            print_json(&schemas)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{json}");
    Ok(())
}
