use anyhow::Result;
use dataset_cache_loader::LoadOrchestrator;

pub async fn run(orchestrator: &LoadOrchestrator, name: &str, token: Option<String>) -> Result<()> {
    let outcome = orchestrator.check_update(name, token.as_deref()).await?;

    println!("update available: {}", outcome.update_available);
    if let Some(remote) = outcome.remote_last_modified {
        println!("remote modified:  {}", remote.to_rfc3339());
    }
    if let Some(cached) = outcome.cache_timestamp {
        println!("cache written:    {}", cached.to_rfc3339());
    }
    println!("details:          {}", outcome.comparison_details);

    if let Some(error) = &outcome.error {
        eprintln!("warning: {error}");
    }

    Ok(())
}
