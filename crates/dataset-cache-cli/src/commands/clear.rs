use anyhow::Result;
use dataset_cache_loader::LoadOrchestrator;

pub fn run(orchestrator: &LoadOrchestrator, name: &str) -> Result<()> {
    if orchestrator.clear_cache(name) {
        println!("cache cleared for {name}");
        Ok(())
    } else {
        anyhow::bail!("nothing to clear for {name} (not a cacheable dataset, or files are in use)")
    }
}
