//! Library module for the groundwater dashboard: ingestion, filtering,
//! statistics, reporting and the HTTP API that serves them

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod ingestion;
pub mod recommend;
pub mod report;
pub mod session;
pub mod stats;
pub mod weather;
