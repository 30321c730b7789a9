use std::sync::Arc;

use anyhow::{Context, Result};
use dataset_cache::{ProgressChannel, ProgressStage};
use dataset_cache_loader::{CacheDecision, LoadOptions, LoadOrchestrator};

use super::format;

pub async fn run(
    orchestrator: &LoadOrchestrator,
    name: &str,
    columns: Option<Vec<String>>,
    token: Option<String>,
) -> Result<()> {
    let channel = Arc::new(ProgressChannel::new());
    let mut subscription = channel
        .subscribe()
        .context("progress channel already subscribed")?;

    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            if event.stage == ProgressStage::KeepAlive {
                continue;
            }
            eprintln!("[{:>3}%] {:<10} {}", event.percent, event.stage, event.message);
        }
    });

    let result = orchestrator
        .load_dataset(
            name,
            LoadOptions {
                columns,
                access_token: token,
                progress: Some(Arc::clone(&channel)),
            },
        )
        .await?;

    let _ = printer.await;

    let provenance = if result.from_cache {
        "from cache".to_owned()
    } else {
        result.cache_decision.to_string()
    };
    println!(
        "{} rows x {} columns in {} ({provenance})",
        result.row_count,
        result.columns.len(),
        format::format_duration(result.elapsed.as_secs_f64()),
    );

    if !result.from_cache && result.cache_decision != CacheDecision::UsingCache {
        // Let the background save land before the process exits.
        orchestrator.wait_for_background_tasks().await;
    }

    Ok(())
}
