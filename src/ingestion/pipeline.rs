//! Load pipeline - fetch, parse and merge every source into one table

use crate::error::LoadError;
use crate::ingestion::fetch::fetch_source;
use crate::ingestion::parse::{parse_source, table_to_records};
use crate::ingestion::types::{
    Column, RawData, Record, Schema, SourceFile, SourceWarning, UnifiedTable,
};
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};

/// Result of a load: the merged table and every source that had to be skipped
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: UnifiedTable,
    pub warnings: Vec<SourceWarning>,
}

/// Fetch and merge all sources, in order
pub async fn load_all(
    sources: &[SourceFile],
    timeout: Duration,
) -> std::result::Result<LoadOutcome, LoadError> {
    info!("=== Loading {} water level sources ===", sources.len());

    let mut fetched = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        info!("Source {}/{}: {}", i + 1, sources.len(), source.name);
        let raw = fetch_source(source, timeout).await;
        fetched.push((source.clone(), raw));
    }

    build_unified_table(fetched)
}

/// Parse fetched payloads and merge the survivors
///
/// A source that fails to download or parse is skipped with a warning. Only
/// when no source yields any rows does the load fail.
pub fn build_unified_table(
    fetched: Vec<(SourceFile, Result<RawData>)>,
) -> std::result::Result<LoadOutcome, LoadError> {
    if fetched.is_empty() {
        return Err(LoadError::NoSources);
    }

    let mut parts = Vec::new();
    let mut warnings = Vec::new();

    for (source, raw) in fetched {
        match raw.and_then(|raw| source_to_records(&source, raw)) {
            Ok(Some(part)) => parts.push(part),
            Ok(None) => info!("{} is empty, skipping", source.name),
            Err(e) => {
                let warning = SourceWarning {
                    source: source.name.clone(),
                    message: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    if parts.is_empty() {
        error!("No valid data could be loaded from the provided sources");
        return Err(LoadError::AllSourcesFailed(warnings));
    }

    let table = merge_parts(parts);
    info!(
        "✓ Unified table ready: {} records ({} sources skipped)",
        table.len(),
        warnings.len()
    );

    Ok(LoadOutcome { table, warnings })
}

/// Parse one source; Ok(None) when it has no rows
pub fn source_to_records(source: &SourceFile, raw: RawData) -> Result<Option<(Vec<Record>, Schema)>> {
    let format = source
        .format()
        .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {}", source.name))?;

    let table = parse_source(raw, format)?;
    if table.is_empty() {
        return Ok(None);
    }

    let (records, schema) = table_to_records(&table);
    info!("Parsed {} records from {}", records.len(), source.name);

    Ok(Some((records, schema)))
}

/// Concatenate parts in order, then drop rows without a date or a reading
pub fn merge_parts(parts: Vec<(Vec<Record>, Schema)>) -> UnifiedTable {
    let mut schema = Schema::new();
    let mut records = Vec::new();

    for (part_records, part_schema) in parts {
        schema.merge(&part_schema);
        records.extend(part_records);
    }

    if schema.contains(Column::Dtwl) && schema.contains(Column::Date) {
        let before = records.len();
        records.retain(|r| r.dtwl.is_some() && r.date.is_some());
        info!(
            "Dropped {} records missing DTWL or DATE",
            before - records.len()
        );
    }

    UnifiedTable::new(schema, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::Season;
    use bytes::Bytes;

    fn csv_source(name: &str, body: &'static str) -> (SourceFile, Result<RawData>) {
        (
            SourceFile::new("mem://", name),
            Ok(RawData::Bytes(Bytes::from_static(body.as_bytes()))),
        )
    }

    #[test]
    fn test_merge_preserves_order_and_drops_incomplete() {
        let fetched = vec![
            csv_source(
                "a.csv",
                "STATE_UT,DATE,DTWL\nGoa,01-01-2020,2.0\nGoa,02-01-2020,\n",
            ),
            csv_source("b.csv", "state_ut,date,dtwl\nKerala,05-11-2021,7.5\n"),
        ];

        let outcome = build_unified_table(fetched).unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.table.records[0].state.as_deref(), Some("Goa"));
        assert_eq!(outcome.table.records[1].state.as_deref(), Some("Kerala"));
        assert_eq!(
            outcome.table.records[1].season,
            Some(Season::Postmonsoon)
        );
    }

    #[test]
    fn test_failed_source_is_skipped_with_warning() {
        let fetched = vec![
            (
                SourceFile::new("mem://", "broken.xlsx"),
                Err(anyhow::anyhow!("HTTP request failed: 404 Not Found")),
            ),
            csv_source("ok.csv", "DATE,DTWL\n01-03-2020,4.0\n"),
        ];

        let outcome = build_unified_table(fetched).unwrap();

        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].source, "broken.xlsx");
    }

    #[test]
    fn test_all_sources_failing_is_fatal() {
        let fetched = vec![
            (
                SourceFile::new("mem://", "a.csv"),
                Err(anyhow::anyhow!("timeout")),
            ),
            csv_source("b.csv", "STATE_UT,DTWL\nGoa,1.0\n"),
        ];

        match build_unified_table(fetched) {
            Err(LoadError::AllSourcesFailed(warnings)) => assert_eq!(warnings.len(), 2),
            other => panic!("Expected AllSourcesFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_no_sources() {
        assert!(matches!(
            build_unified_table(Vec::new()),
            Err(LoadError::NoSources)
        ));
    }

    #[test]
    fn test_unsupported_extension_warns() {
        let fetched = vec![
            csv_source("notes.txt", "DATE,DTWL\n01-01-2020,1.0\n"),
            csv_source("ok.csv", "DATE,DTWL\n01-01-2020,1.0\n"),
        ];

        let outcome = build_unified_table(fetched).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_rows_kept_when_dtwl_column_absent_everywhere() {
        let parts = vec![(
            vec![Record::default()],
            [Column::Date].into_iter().collect::<Schema>(),
        )];

        let table = merge_parts(parts);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_every_kept_record_has_a_season() {
        let fetched = vec![csv_source(
            "a.csv",
            "DATE,DTWL\n01-06-2020,1.0\nbad-date,2.0\n15-08-2021,3.0\n",
        )];

        let outcome = build_unified_table(fetched).unwrap();

        assert_eq!(outcome.table.len(), 2);
        assert!(outcome.table.records.iter().all(|r| r.season.is_some()));
    }
}
