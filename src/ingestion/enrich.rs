//! Enrichment functions - add derived data to water level records

use crate::ingestion::types::{Record, Season};
use chrono::{Datelike, NaiveDate};
use tracing::debug;

/// Bucket a measurement date into a season by calendar month
/// Pure function - total over every month and the absent date
pub fn classify_season(date: Option<NaiveDate>) -> Season {
    match date.map(|d| d.month()) {
        None => Season::Unknown,
        Some(1..=5) => Season::Premonsoon,
        Some(8) | Some(10..=12) => Season::Postmonsoon,
        Some(_) => Season::Other,
    }
}

/// Attach a season to every record of a source that carries a DATE column
pub fn tag_seasons(records: Vec<Record>) -> Vec<Record> {
    let tagged: Vec<Record> = records
        .into_iter()
        .map(|record| Record {
            season: Some(classify_season(record.date)),
            ..record
        })
        .collect();

    debug!("Tagged {} records with a season", tagged.len());

    tagged
}
