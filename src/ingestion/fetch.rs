//! Fetch functions - retrieve raw data from remote or local sources

use crate::ingestion::types::{RawData, SourceFile};
use crate::ingestion::utils::http_get;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Fetch one source file: download remote URLs, hand local paths through
pub async fn fetch_source(source: &SourceFile, timeout: Duration) -> Result<RawData> {
    if source.is_remote() {
        info!("Fetching {} from {}", source.name, source.location);
        let bytes = http_get(&source.location, timeout).await?;
        return Ok(RawData::Bytes(bytes));
    }

    let path = PathBuf::from(&source.location);
    if !path.is_file() {
        return Err(anyhow::anyhow!("File not found: {:?}", path));
    }

    info!("Using local file {:?}", path);
    Ok(RawData::File(path))
}
