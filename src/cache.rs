//! Process-wide dataset cache
//!
//! Loading every source is network bound, so the merged table and its
//! location index are built once per source list and shared behind an
//! `Arc`. A different source list forces a fresh load; `reload` swaps in a
//! new dataset only once it has loaded.

use crate::error::LoadError;
use crate::index::LocationIndex;
use crate::ingestion::pipeline::{load_all, LoadOutcome};
use crate::ingestion::types::{SourceFile, SourceWarning, UnifiedTable};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The unified table together with the lookups derived from it
#[derive(Debug)]
pub struct Dataset {
    pub table: UnifiedTable,
    pub index: LocationIndex,
    pub warnings: Vec<SourceWarning>,
}

impl Dataset {
    pub fn new(table: UnifiedTable, warnings: Vec<SourceWarning>) -> Self {
        let index = LocationIndex::build(&table);
        Dataset {
            table,
            index,
            warnings,
        }
    }
}

impl From<LoadOutcome> for Dataset {
    fn from(outcome: LoadOutcome) -> Self {
        Dataset::new(outcome.table, outcome.warnings)
    }
}

/// Identity of a source list: the ordered locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSetKey(Vec<String>);

impl From<&[SourceFile]> for SourceSetKey {
    fn from(sources: &[SourceFile]) -> Self {
        SourceSetKey(sources.iter().map(|s| s.location.clone()).collect())
    }
}

#[derive(Debug)]
struct Cached {
    key: SourceSetKey,
    dataset: Arc<Dataset>,
}

#[derive(Debug, Default)]
pub struct DatasetCache {
    inner: Mutex<Option<Cached>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        DatasetCache::default()
    }

    /// Cached dataset for `sources`, running `load` only on a miss
    ///
    /// The lock is held while loading, so concurrent callers wait for the
    /// first load instead of starting their own.
    pub async fn get_or_load<F, Fut>(
        &self,
        sources: &[SourceFile],
        load: F,
    ) -> Result<Arc<Dataset>, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadOutcome, LoadError>>,
    {
        let key = SourceSetKey::from(sources);
        let mut guard = self.inner.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.key == key {
                return Ok(Arc::clone(&cached.dataset));
            }
            info!("Source list changed, reloading dataset");
        }

        let dataset = Arc::new(Dataset::from(load().await?));
        *guard = Some(Cached {
            key,
            dataset: Arc::clone(&dataset),
        });

        Ok(dataset)
    }

    /// Fetch from the network (or disk) on a miss
    pub async fn get_or_fetch(
        &self,
        sources: &[SourceFile],
        timeout: Duration,
    ) -> Result<Arc<Dataset>, LoadError> {
        self.get_or_load(sources, || load_all(sources, timeout)).await
    }

    /// Load `sources` afresh and replace the cached dataset
    ///
    /// The load runs without the lock so readers keep getting the current
    /// dataset meanwhile. On failure the cached dataset is left in place.
    pub async fn reload<F, Fut>(
        &self,
        sources: &[SourceFile],
        load: F,
    ) -> Result<Arc<Dataset>, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadOutcome, LoadError>>,
    {
        let key = SourceSetKey::from(sources);
        let dataset = match load().await {
            Ok(outcome) => Arc::new(Dataset::from(outcome)),
            Err(e) => {
                warn!("Reload failed, keeping the current dataset: {}", e);
                return Err(e);
            }
        };

        *self.inner.lock().await = Some(Cached {
            key,
            dataset: Arc::clone(&dataset),
        });
        info!("Dataset reloaded: {} records", dataset.table.len());

        Ok(dataset)
    }

    /// Reload from the network (or disk)
    pub async fn refetch(
        &self,
        sources: &[SourceFile],
        timeout: Duration,
    ) -> Result<Arc<Dataset>, LoadError> {
        self.reload(sources, || load_all(sources, timeout)).await
    }
}
