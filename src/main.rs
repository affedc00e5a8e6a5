//! loki-nlu CLI entry point.
//!
//! Provides `match`, `raw`, and `exercise` subcommands for running the
//! full batching pipeline, performing one low-level bulk call, or
//! streaming an utterance file through the matcher.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use loki_nlu::accumulator::Accumulator;
use loki_nlu::batch::{BatchInput, BatchRunner};
use loki_nlu::client::{LokiClient, MatchService};
use loki_nlu::config::{Account, Settings};
use loki_nlu::handler::HandlerRegistry;
use loki_nlu::logging;

/// loki-nlu — batching client for the Loki bulk intent-matching API.
#[derive(Parser)]
#[command(name = "loki-nlu", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and print the merged accumulator as JSON.
    Match {
        /// Input text; a single argument is treated as raw free text,
        /// several arguments as pre-split items.
        #[arg(required = true)]
        text: Vec<String>,
        /// Restrict matching to an intent; repeatable.
        #[arg(long = "filter", value_name = "INTENT")]
        filters: Vec<String>,
        /// Characters to segment raw text on, e.g. "？！，。".
        #[arg(long, value_name = "CHARS", default_value = "")]
        split: String,
        /// JSON file holding the reference template.
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,
    },
    /// Perform one bulk call and print the structured response as JSON.
    Raw {
        /// Input items for a single request.
        #[arg(required = true)]
        text: Vec<String>,
        /// Restrict matching to an intent; repeatable.
        #[arg(long = "filter", value_name = "INTENT")]
        filters: Vec<String>,
    },
    /// Stream a newline-separated utterance file through the matcher and
    /// report per-utterance outcomes.
    Exercise {
        /// File of utterances, one per line.
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Restrict matching to an intent; repeatable.
        #[arg(long = "filter", value_name = "INTENT")]
        filters: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_cli();
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load settings")?;
    let account = Account::load(&settings.account_path);
    if !account.is_configured() {
        warn!("account credentials are empty; the remote service will reject calls");
    }
    let client = LokiClient::new(&settings, account);

    match cli.command {
        Command::Match {
            text,
            filters,
            split,
            template,
        } => handle_match(client, &settings, text, filters, &split, template.as_deref()).await,
        Command::Raw { text, filters } => handle_raw(client, &text, &filters).await,
        Command::Exercise { file, filters } => {
            handle_exercise(client, &settings, &file, &filters).await
        }
    }
}

/// Run the full pipeline and print the merged accumulator.
async fn handle_match(
    client: LokiClient,
    settings: &Settings,
    text: Vec<String>,
    filters: Vec<String>,
    split: &str,
    template_path: Option<&Path>,
) -> Result<()> {
    let template = load_template(template_path)?;
    let delimiters: Vec<char> = split.chars().collect();
    let mut text = text;
    let input = if text.len() == 1 {
        BatchInput::Text(text.remove(0))
    } else {
        BatchInput::Items(text)
    };

    // The registry is empty here: handlers are domain plugins registered
    // by embedding applications through the library API.
    let runner = BatchRunner::new(
        Box::new(client),
        HandlerRegistry::new(),
        settings.input_limit,
    );
    let merged = runner.run(input, &filters, &delimiters, &template).await;
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

/// Perform one low-level bulk call and print the structured response.
async fn handle_raw(client: LokiClient, text: &[String], filters: &[String]) -> Result<()> {
    let response = client.match_batch(text, filters).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Stream an utterance file through the matcher, one chunk at a time,
/// and report which intents each utterance hit.
async fn handle_exercise(
    client: LokiClient,
    settings: &Settings,
    file: &Path,
    filters: &[String],
) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let utterances: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if utterances.is_empty() {
        println!("no utterances in {}", file.display());
        return Ok(());
    }

    let mut matched = 0_usize;
    for chunk in utterances.chunks(settings.input_limit) {
        let response = client.match_batch(chunk, filters).await;
        if !response.accepted {
            println!("[FAIL] {}", response.message);
            return Ok(());
        }
        for (index, utterance) in chunk.iter().enumerate() {
            if response.item_accepted(index) {
                matched = matched.saturating_add(1);
                let intents: Vec<&str> = (0..response.match_count(index))
                    .map(|j| response.intent(index, j))
                    .collect();
                println!("[HIT]  {utterance} => {}", intents.join(", "));
            } else {
                println!("[MISS] {utterance} => {}", response.item_message(index));
            }
        }
    }
    println!("{matched}/{} utterances matched", utterances.len());
    Ok(())
}

/// Load the reference template from a JSON file, or start empty.
fn load_template(path: Option<&Path>) -> Result<Accumulator> {
    let Some(path) = path else {
        return Ok(Accumulator::new());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    let template: Accumulator = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse template {}", path.display()))?;
    Ok(template)
}
