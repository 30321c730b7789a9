use std::io::Cursor;

use dataset_cache::FetchedPayload;
use polars::prelude::*;

use crate::orchestrator::LoadError;

enum PayloadFormat {
    Csv,
    Parquet,
}

fn detect_format(label: &str) -> Result<PayloadFormat, LoadError> {
    let lower = label.to_lowercase();
    if lower.ends_with(".csv") {
        Ok(PayloadFormat::Csv)
    } else if lower.ends_with(".parquet") {
        Ok(PayloadFormat::Parquet)
    } else {
        Err(LoadError::Parse(format!(
            "unsupported payload format: {label:?}"
        )))
    }
}

/// Turn raw payload bytes into a frame. CPU-bound; callers run this on
/// the blocking worker pool, never on the orchestration thread.
///
/// Column names are trimmed and lowercased before anything matches
/// against them. A requested projection keeps only the requested columns
/// that actually exist — a missing column is not an error here, the
/// caller's configuration decides what to do with a thinner frame.
pub fn parse_payload(
    payload: &FetchedPayload,
    projection: Option<&[String]>,
) -> Result<DataFrame, LoadError> {
    let format = detect_format(&payload.label)?;

    let mut combined: Option<DataFrame> = None;
    for segment in &payload.segments {
        let mut frame = parse_segment(segment, &format, &payload.label)?;
        normalize_column_names(&mut frame)
            .map_err(|e| LoadError::Parse(format!("column normalization failed: {e}")))?;

        match combined.as_mut() {
            None => combined = Some(frame),
            Some(base) => {
                base.vstack_mut(&frame)
                    .map_err(|e| LoadError::Parse(format!("partition stacking failed: {e}")))?;
            }
        }
    }

    let mut frame =
        combined.ok_or_else(|| LoadError::Parse("payload carried no segments".into()))?;

    if let Some(requested) = projection {
        let existing = frame.get_column_names();
        let available: Vec<String> = requested
            .iter()
            .filter(|c| existing.iter().any(|name| *name == c.as_str()))
            .cloned()
            .collect();
        if !available.is_empty() {
            frame = frame
                .select(available)
                .map_err(|e| LoadError::Parse(format!("column projection failed: {e}")))?;
        }
    }

    Ok(frame)
}

fn parse_segment(
    bytes: &[u8],
    format: &PayloadFormat,
    label: &str,
) -> Result<DataFrame, LoadError> {
    match format {
        PayloadFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| LoadError::Parse(format!("CSV parse of {label:?} failed: {e}"))),
        PayloadFormat::Parquet => ParquetReader::new(Cursor::new(bytes))
            .finish()
            .map_err(|e| LoadError::Parse(format!("Parquet parse of {label:?} failed: {e}"))),
    }
}

fn normalize_column_names(frame: &mut DataFrame) -> PolarsResult<()> {
    let normalized: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();
    frame.set_column_names(&normalized)
}

/// Left-join the enrichment frame onto the primary by the configured key.
///
/// Returns `Ok(None)` when there is no key or either side lacks it —
/// enrichment is strictly optional and silently skipping it is the
/// contract.
pub fn merge_enrichment(
    primary: &DataFrame,
    enrichment: &DataFrame,
    join_key: Option<&str>,
) -> PolarsResult<Option<DataFrame>> {
    let Some(key) = join_key else {
        return Ok(None);
    };

    let in_primary = primary.get_column_names().iter().any(|c| *c == key);
    let in_enrichment = enrichment.get_column_names().iter().any(|c| *c == key);
    if !in_primary || !in_enrichment {
        return Ok(None);
    }

    let merged = primary.join(enrichment, [key], [key], JoinArgs::new(JoinType::Left))?;
    Ok(Some(merged))
}
