//! Data ingestion module - functional pipeline for multi-source water level data

pub mod enrich;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use types::*;
