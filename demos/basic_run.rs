use std::sync::Arc;
use std::time::Duration;

use rewrite_pipeline::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Local Ollama at the default endpoint
    let provider = Arc::new(OllamaProvider::default());

    let config = PipelineConfig::builder()
        .with_model("llama3.2")
        .with_concurrency(2)
        .with_delay(Duration::from_millis(250))
        .build();

    let engine = Arc::new(PipelineEngine::new(provider, config));
    engine.load(sample_dataset())?;

    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let PipelineEvent::BatchSettled { batch, stats } = event {
                println!(
                    "batch {}: {}/{} done ({:.0}%)",
                    batch,
                    stats.processed,
                    stats.total,
                    stats.percent()
                );
            }
        }
    });

    let summary = engine.start().await?;
    printer.abort();

    println!(
        "Finished: {} succeeded, {} failed in {} batches",
        summary.stats.successful, summary.stats.failed, summary.batches
    );

    for item in engine.snapshot() {
        match item.status {
            ItemStatus::Completed => println!(
                "[{}] {}\n  -> {}",
                item.id,
                item.original_text,
                item.rewritten_text.unwrap_or_default()
            ),
            _ => println!(
                "[{}] {:?}: {}",
                item.id,
                item.status,
                item.error_message.unwrap_or_default()
            ),
        }
    }

    // Failed items can go around again, up to max_retries
    let requeued = engine.requeue_failed();
    if requeued > 0 {
        println!("{} failed items requeued for the next run", requeued);
    }

    Ok(())
}
