//! Configuration loaded from environment variables (and `.env`)

use crate::ingestion::types::SourceFile;
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/TharunPranav2007/Groundwater-Level-Monitoring-using-DWLR-Data/main/";

pub const DEFAULT_SOURCES: [&str; 6] = [
    "august_wl_1994-2023_compressed-clean.csv",
    "january_wl_1994-2024-compressed-clean.xlsx",
    "post-monsoon_wl_1994-2023_compressed-clean.xlsx",
    "pre-monsoon_1994-2003-clean.csv",
    "pre-monsoon_2004-2013-clean.csv",
    "pre-monsoon_2014-2024-clean.csv",
];

pub const DEFAULT_WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub source_names: Vec<String>,
    pub weather_url: String,
    pub weather_api_key: Option<String>,
    pub weather_timeout: Duration,
    pub download_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let source_names = match env::var("GROUNDWATER_SOURCES") {
            Ok(list) => parse_source_list(&list),
            Err(_) => DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Config {
            base_url: env::var("GROUNDWATER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),

            source_names,

            weather_url: env::var("OPENWEATHER_URL")
                .unwrap_or_else(|_| DEFAULT_WEATHER_URL.to_string()),

            weather_api_key: env::var("OPENWEATHER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),

            weather_timeout: Duration::from_secs(10),

            download_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),

            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3001".to_string())
                .parse()
                .context("BIND_ADDR must be a socket address such as 127.0.0.1:3001")?,

            session_idle: Duration::from_secs(
                env::var("SESSION_IDLE_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
            ),
        })
    }

    /// The configured files, resolved against the base URL or directory
    pub fn sources(&self) -> Vec<SourceFile> {
        self.source_names
            .iter()
            .map(|name| SourceFile::new(&self.base_url, name))
            .collect()
    }
}

fn parse_source_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_list() {
        assert_eq!(
            parse_source_list(" a.csv, b.xlsx ,,"),
            vec!["a.csv".to_string(), "b.xlsx".to_string()]
        );
        assert!(parse_source_list("").is_empty());
    }

    #[test]
    fn test_default_sources_resolve_against_base() {
        let config = Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            source_names: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            weather_api_key: None,
            weather_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(300),
            bind_addr: "127.0.0.1:3001".parse().unwrap(),
            session_idle: Duration::from_secs(3600),
        };

        let sources = config.sources();

        assert_eq!(sources.len(), 6);
        assert!(sources.iter().all(|s| s.is_remote() && s.format().is_some()));
        assert_eq!(
            sources[0].location,
            format!("{}august_wl_1994-2023_compressed-clean.csv", DEFAULT_BASE_URL)
        );
    }
}
