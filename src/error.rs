//! Typed errors that cross module boundaries

use crate::ingestion::types::SourceWarning;
use crate::filter::Level;
use thiserror::Error;

/// Fatal dataset load failures - nothing sensible can be shown after these
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No data sources configured")]
    NoSources,

    #[error("No valid data could be loaded from the provided sources ({} failed)", .0.len())]
    AllSourcesFailed(Vec<SourceWarning>),
}

/// A selection that the cascading menus would never have offered
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{value:?} is not a known {level} for the current selection")]
    NotOffered { level: Level, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("Weather or water level data unavailable.")]
    InputsUnavailable,
}
