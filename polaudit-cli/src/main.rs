//! polaudit CLI - policy compliance gap analysis via pluggable LLM providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use polaudit_core::{
    AnalysisRunner, BatchOutcome, ControlRow, OutputStore, PipelineConfig, RewriteRunner, StageRequest,
    prompt,
};
use polaudit_llm::{EndpointConfig, LlmClient, Provider};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "polaudit.toml";

#[derive(Parser)]
#[command(name = "polaudit")]
#[command(version)]
#[command(about = "Check a policy document against a control framework with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults to ./polaudit.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse every control against the policy text
    Analyze {
        /// JSON array of control rows ({id, title, control, category?})
        #[arg(long)]
        controls: PathBuf,

        /// Plain-text policy document
        #[arg(long)]
        policy: PathBuf,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Rewrite analysis suggestions into report-ready bullets
    Rewrite {
        /// Name of an analysis output file inside the output directory
        #[arg(long)]
        input: String,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// List supported providers and their advertised models
    Models,

    /// Show example configuration
    ExampleConfig,
}

#[derive(clap::Args)]
struct LlmArgs {
    /// Provider: anthropic, openai, or ollama
    #[arg(long)]
    provider: String,

    /// Provider-specific model name
    #[arg(long)]
    model: String,

    /// File with a system prompt overriding the built-in one
    #[arg(long)]
    system_prompt: Option<PathBuf>,
}

impl LlmArgs {
    fn stage_request(&self, default_prompt: &str) -> Result<StageRequest> {
        let provider: Provider = self
            .provider
            .parse()
            .map_err(|e: polaudit_llm::LlmError| anyhow::anyhow!(e.user_message()))?;
        if !provider.advertised_models().contains(&self.model.as_str()) {
            warn!(
                %provider,
                model = %self.model,
                advertised = ?provider.advertised_models(),
                "Model is not in the advertised list for this provider"
            );
        }

        let system_prompt = match &self.system_prompt {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read system prompt from {path:?}"))?,
            None => default_prompt.to_string(),
        };
        Ok(StageRequest::new(&self.provider, &self.model, system_prompt))
    }
}

fn setup_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {path:?}")),
        None if Path::new(DEFAULT_CONFIG).exists() => PipelineConfig::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config from {DEFAULT_CONFIG}")),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let body = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    serde_json::from_str(&body).with_context(|| format!("Failed to parse {path:?}"))
}

/// Rows for the rewrite stage: either a bare array or an analysis report.
fn read_rewrite_rows(path: &Path) -> Result<Vec<ControlRow>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Input {
        Rows(Vec<ControlRow>),
        Report { results: Vec<ControlRow> },
    }

    Ok(match read_json::<Input>(path)? {
        Input::Rows(rows) | Input::Report { results: rows } => rows,
    })
}

fn print_example_config() {
    let example = r#"# polaudit configuration file
#
# Credentials are read from the environment, never from this file:
#   ANTHROPIC_API_KEY, OPENAI_API_KEY
#   OLLAMA_HOST (default http://localhost:11434; bare host:port is accepted)

[general]
log_level = "info"

[llm]
max_tokens = 1024
timeout_secs = 60

[llm.retry]
max_attempts = 3
base_delay_ms = 500
jitter = 0.1

[limits]
max_policy_chars = 50000
max_field_chars = 4000
max_suggestion_items = 10
max_suggestion_chars = 2000

[output]
dir = "outputs"
"#;
    println!("{example}");
}

fn write_and_summarize<T: Serialize>(
    store: &OutputStore,
    tag: &str,
    title: &str,
    outcome: &BatchOutcome<T>,
) -> Result<()> {
    let file = store
        .write_json(tag, &outcome.report())
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("\n=== {title} Complete ===");
    println!("Rows:        {}", outcome.len());
    println!("Succeeded:   {}", outcome.len() - outcome.failure_count());
    println!("Failed:      {}", outcome.failure_count());
    for failure in outcome.failures() {
        println!("  - row {} ({}): {}", failure.index + 1, failure.row_id, failure.message);
    }
    println!("Output:      {}", store.dir().join(&file).display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::ExampleConfig) {
        print_example_config();
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    setup_logging(&config.general.log_level, cli.verbose);

    // Read the environment exactly once; everything below gets this value.
    let endpoints = EndpointConfig::from_env();
    let store = OutputStore::new(config.output.dir.clone());

    match cli.command {
        Commands::ExampleConfig => unreachable!("handled above"),

        Commands::Models => {
            for provider in Provider::all() {
                let status = if endpoints.is_configured(*provider) { "configured" } else { "not configured" };
                println!("{provider} ({status})");
                for model in provider.advertised_models() {
                    println!("  {model}");
                }
            }
        }

        Commands::Analyze { controls, policy, llm } => {
            let stage = llm.stage_request(prompt::ANALYSIS_SYSTEM)?;
            let rows: Vec<ControlRow> = read_json(&controls)?;
            if rows.is_empty() {
                bail!("No control rows in {controls:?}");
            }
            let policy_text = std::fs::read_to_string(&policy)
                .with_context(|| format!("Failed to read policy from {policy:?}"))?;

            let client = Arc::new(LlmClient::from_config(&endpoints, &config.llm)?);
            info!(rows = rows.len(), provider = %stage.provider, model = %stage.model, "Starting analysis");

            let outcome = AnalysisRunner::new(client, config.limits)
                .run(&stage, &rows, &policy_text)
                .await;
            write_and_summarize(&store, "llm1", "Analysis", &outcome)?;
        }

        Commands::Rewrite { input, llm } => {
            let stage = llm.stage_request(prompt::REWRITE_SYSTEM)?;
            let path = store
                .resolve(&input)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let rows = read_rewrite_rows(&path)?;

            let client = Arc::new(LlmClient::from_config(&endpoints, &config.llm)?);
            info!(rows = rows.len(), provider = %stage.provider, model = %stage.model, "Starting rewrite");

            let outcome = RewriteRunner::new(client, config.limits).run(&stage, &rows).await;
            write_and_summarize(&store, "llm2", "Rewrite", &outcome)?;
        }
    }

    Ok(())
}
