use anyhow::{Context, Result};
use groundwater_dashboard::api::{router, AppState};
use groundwater_dashboard::cache::DatasetCache;
use groundwater_dashboard::config::Config;
use groundwater_dashboard::weather::WeatherClient;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting groundwater dashboard API server");

    let config = Config::from_env()?;
    let sources = config.sources();
    info!("Configured {} data sources from {}", sources.len(), config.base_url);

    let weather = WeatherClient::new(
        config.weather_url.clone(),
        config.weather_api_key.clone(),
        config.weather_timeout,
    )?;
    if config.weather_api_key.is_none() {
        warn!("OPENWEATHER_API_KEY not set, weather will be reported as unavailable");
    }

    // Load once up front; nothing can be served without a dataset
    let cache = Arc::new(DatasetCache::new());
    let dataset = cache
        .get_or_fetch(&sources, config.download_timeout)
        .await
        .context("Initial dataset load failed")?;
    for warning in &dataset.warnings {
        warn!("{}", warning);
    }
    info!(
        "Dataset ready: {} records, {} states",
        dataset.table.len(),
        dataset.index.states.len()
    );

    let state = AppState::new(
        cache,
        sources,
        config.download_timeout,
        weather,
        config.session_idle,
    );
    let app = router(state);

    info!("Server running on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
