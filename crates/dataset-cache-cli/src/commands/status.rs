use anyhow::Result;
use dataset_cache_loader::LoadOrchestrator;

use super::format;

pub fn run(orchestrator: &LoadOrchestrator) -> Result<()> {
    let status = orchestrator.cache_status();

    println!("cache directory: {}", status.cache_directory.display());

    if status.entries.is_empty() {
        println!("no cacheable datasets configured");
        return Ok(());
    }

    let name_width = status
        .entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0);

    for entry in &status.entries {
        let state = if entry.cached {
            let rows = entry
                .row_count
                .map(|n| format!("{n} rows"))
                .unwrap_or_else(|| "? rows".to_owned());
            let size = entry
                .file_size_bytes
                .map(format::format_file_size)
                .unwrap_or_else(|| "?".to_owned());
            let when = entry
                .cached_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "?".to_owned());
            let suffix = if entry.expired { " (expired)" } else { "" };
            format!("cached  {rows}, {size}, {when}{suffix}")
        } else {
            "not cached".to_owned()
        };

        println!("  {:<width$}  {state}", entry.name, width = name_width);
    }

    Ok(())
}
