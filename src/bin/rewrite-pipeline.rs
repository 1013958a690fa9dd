//! rewrite-pipeline CLI: run a JSON dataset through the batch engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rewrite_pipeline::{
    dataset, GeminiProvider, OllamaProvider, PipelineConfig, PipelineEngine, PipelineEvent,
    TextProvider,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderKind {
    Gemini,
    Ollama,
}

#[derive(Parser)]
#[command(
    name = "rewrite-pipeline",
    about = "Rewrite a dataset of texts through an LLM in throttled batches"
)]
struct Cli {
    /// JSON dataset to process
    #[arg(long, required_unless_present = "sample")]
    input: Option<PathBuf>,
    /// Use the built-in five-row demo dataset
    #[arg(long, conflicts_with = "input")]
    sample: bool,
    /// TOML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Inference backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Gemini)]
    provider: ProviderKind,
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Override the provider endpoint
    #[arg(long)]
    endpoint: Option<String>,
    /// Override the configured model
    #[arg(long)]
    model: Option<String>,
    /// Override the configured concurrency
    #[arg(long)]
    concurrency: Option<usize>,
    /// Where to write the export (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let provider = build_provider(&cli)?;
    let items = match &cli.input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading dataset {}", path.display()))?;
            dataset::parse_dataset(&text)?
        }
        None => dataset::sample_dataset(),
    };

    let engine = Arc::new(PipelineEngine::new(provider, config));
    engine.load(items)?;

    let progress = tokio::spawn(log_progress(engine.subscribe()));

    let run = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.start().await }
    });

    let stopper = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after in-flight requests");
                engine.stop();
            }
        }
    });

    let outcome = run.await.context("engine task panicked")?;
    stopper.abort();
    progress.abort();

    match &outcome {
        Ok(summary) => info!(
            successful = summary.stats.successful,
            failed = summary.stats.failed,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "Run finished"
        ),
        Err(e) => error!(error = %e, "Run did not start"),
    }

    let export = engine.export_json()?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, export)
                .with_context(|| format!("writing export {}", path.display()))?;
            info!(path = %path.display(), "Export written");
        }
        None => println!("{}", export),
    }

    outcome?;
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

fn build_provider(cli: &Cli) -> anyhow::Result<Arc<dyn TextProvider>> {
    match cli.provider {
        ProviderKind::Gemini => {
            let Some(key) = cli.api_key.as_deref() else {
                bail!("Gemini needs an API key: pass --api-key or set GEMINI_API_KEY");
            };
            let mut provider = GeminiProvider::new(key);
            if let Some(endpoint) = &cli.endpoint {
                provider = provider.with_endpoint(endpoint.as_str());
            }
            Ok(Arc::new(provider))
        }
        ProviderKind::Ollama => {
            let provider = match &cli.endpoint {
                Some(endpoint) => OllamaProvider::new(endpoint.as_str()),
                None => OllamaProvider::default(),
            };
            Ok(Arc::new(provider))
        }
    }
}

async fn log_progress(mut events: tokio::sync::broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(PipelineEvent::BatchSettled { batch, stats }) => info!(
                batch,
                processed = stats.processed,
                total = stats.total,
                percent = stats.percent(),
                eta_ms = stats.estimated_remaining_ms,
                "Batch settled"
            ),
            Ok(PipelineEvent::ItemFailed { id, error, .. }) => {
                warn!(item_id = %id, %error, "Item failed")
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
