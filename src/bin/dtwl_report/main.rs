//! Offline report generator - loads the sources, applies a selection and
//! writes the same CSV the dashboard offers for download

use anyhow::{bail, Context, Result};
use groundwater_dashboard::cache::Dataset;
use groundwater_dashboard::config::Config;
use groundwater_dashboard::filter::Level;
use groundwater_dashboard::ingestion::pipeline::load_all;
use groundwater_dashboard::report::REPORT_FILE_NAME;
use groundwater_dashboard::session::Session;
use groundwater_dashboard::weather::WeatherClient;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct Args {
    selection: Vec<(Level, String)>,
    search: Option<String>,
    out: Option<PathBuf>,
}

/// `state=Kerala district=Wayanad search=... out=report.csv`
fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();

    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("Expected key=value, got {:?}", arg);
        };

        match key {
            "state" => parsed.selection.push((Level::State, value.to_string())),
            "district" => parsed.selection.push((Level::District, value.to_string())),
            "block" => parsed.selection.push((Level::Block, value.to_string())),
            "village" => parsed.selection.push((Level::Village, value.to_string())),
            "pincode" => parsed.selection.push((Level::Pincode, value.to_string())),
            "search" => parsed.search = Some(value.to_string()),
            "out" => parsed.out = Some(PathBuf::from(value)),
            _ => bail!("Unknown argument {:?}", key),
        }
    }

    // Outer levels first so each value is checked against its parent
    parsed.selection.sort_by_key(|(level, _)| *level);

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let config = Config::from_env()?;
    info!("Configuration loaded");

    info!("Step 1/3: Loading {} sources...", config.source_names.len());
    let outcome = load_all(&config.sources(), config.download_timeout).await?;
    for warning in &outcome.warnings {
        warn!("{}", warning);
    }
    let dataset = Dataset::from(outcome);
    info!("✓ Loaded {} records", dataset.table.len());

    info!("Step 2/3: Applying selection...");
    let mut session = Session::new();
    for (level, value) in &args.selection {
        session.select(&dataset, *level, value)?;
    }
    if let Some(query) = &args.search {
        session.set_query(query);
    }

    let weather = WeatherClient::new(
        config.weather_url.clone(),
        config.weather_api_key.clone(),
        config.weather_timeout,
    )?
    .lookup(&session.selection)
    .await;

    let view = session.dashboard(&dataset, weather);
    if view.no_data {
        warn!("No data available for the selected filters.");
    }
    info!("Location: {}", view.location);
    info!("Rows: {}", view.row_count);
    info!("Overall DTWL (m): {}", view.kpis.overall_dtwl.format(2));
    info!("Current DTWL (m): {}", view.kpis.current_dtwl.format(2));
    info!("Pre-Monsoon DTWL (m): {}", view.kpis.premonsoon_dtwl.format(2));
    info!("Post-Monsoon DTWL (m): {}", view.kpis.postmonsoon_dtwl.format(2));

    info!("Step 3/3: Writing report...");
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(REPORT_FILE_NAME));
    let report = session.report(&dataset, &weather)?;
    std::fs::write(&out, report)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!("✓ Report written to {}", out.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_orders_levels() {
        let parsed = parse_args(&args(&[
            "district=Wayanad",
            "state=Kerala",
            "search=meppadi",
            "out=/tmp/r.csv",
        ]))
        .unwrap();

        assert_eq!(
            parsed.selection,
            vec![
                (Level::State, "Kerala".to_string()),
                (Level::District, "Wayanad".to_string())
            ]
        );
        assert_eq!(parsed.search.as_deref(), Some("meppadi"));
        assert_eq!(parsed.out, Some(PathBuf::from("/tmp/r.csv")));
    }

    #[test]
    fn test_parse_args_rejects_unknown() {
        assert!(parse_args(&args(&["colour=blue"])).is_err());
        assert!(parse_args(&args(&["Kerala"])).is_err());
        assert_eq!(parse_args(&[]).unwrap(), Args::default());
    }
}
