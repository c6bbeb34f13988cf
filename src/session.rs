//! Per-session dashboard context
//!
//! A session owns everything one user changes: the location selection, the
//! free-text query, the page being viewed and the last recommendation. The
//! dataset itself is shared read-only and passed in.

use crate::cache::Dataset;
use crate::error::{RecommendationError, SelectionError};
use crate::filter::{apply_filter, FilteredView, Level, LocationSelection};
use crate::recommend::{recommend, Recommendation};
use crate::report::{build_report, ReportSummary};
use crate::stats::{compute_kpis, trend_series, Kpis, TrendSeries};
use crate::weather::WeatherLookup;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Home,
    Report,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub selection: LocationSelection,
    pub query: String,
    pub page: Page,
    pub recommendation: Recommendation,
}

/// Everything the summary page shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub location: String,
    pub row_count: usize,
    pub no_data: bool,
    pub kpis: Kpis,
    pub weather: WeatherLookup,
    pub recommendation: Recommendation,
    pub page: Page,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    fn query(&self) -> Option<&str> {
        Some(self.query.as_str()).filter(|q| !q.is_empty())
    }

    /// Menu contents for every level given the current selection
    pub fn options(&self, dataset: &Dataset) -> BTreeMap<Level, Vec<String>> {
        Level::ALL
            .into_iter()
            .map(|level| {
                (
                    level,
                    dataset.index.options(level, &self.selection).to_vec(),
                )
            })
            .collect()
    }

    /// Choose a value at one level; an empty value clears that level
    ///
    /// Only values the menu offers are accepted. Lower levels whose value
    /// is no longer offered afterwards are cleared.
    pub fn select(
        &mut self,
        dataset: &Dataset,
        level: Level,
        value: &str,
    ) -> Result<(), SelectionError> {
        let value = value.trim();
        if !value.is_empty() {
            let offered = dataset.index.options(level, &self.selection);
            if !offered.iter().any(|v| v == value) {
                return Err(SelectionError::NotOffered {
                    level,
                    value: value.to_string(),
                });
            }
        }

        self.selection.set(level, value);

        for lower in level.below() {
            let current = self.selection.get(lower);
            if current.is_empty() {
                continue;
            }
            let still_offered = dataset
                .index
                .options(lower, &self.selection)
                .iter()
                .any(|v| v == current);
            if !still_offered {
                debug!("Clearing {} {:?}, no longer offered", lower, current);
                self.selection.set(lower, "");
            }
        }

        Ok(())
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
    }

    pub fn set_page(&mut self, page: Page) {
        self.page = page;
    }

    /// Reset filters, query and recommendation; back to the summary page
    pub fn clear(&mut self) {
        *self = Session::default();
    }

    pub fn filtered<'a>(&self, dataset: &'a Dataset) -> FilteredView<'a> {
        apply_filter(&dataset.table, &self.selection, self.query())
    }

    pub fn dashboard(&self, dataset: &Dataset, weather: WeatherLookup) -> DashboardView {
        let view = self.filtered(dataset);
        DashboardView {
            location: self.selection.label(),
            row_count: view.len(),
            no_data: view.is_empty(),
            kpis: compute_kpis(&view),
            weather,
            recommendation: self.recommendation.clone(),
            page: self.page,
        }
    }

    pub fn trends(&self, dataset: &Dataset) -> Vec<TrendSeries> {
        trend_series(&self.filtered(dataset))
    }

    /// Generate and remember a recommendation; state is untouched on failure
    pub fn generate_recommendation(
        &mut self,
        dataset: &Dataset,
        weather: &WeatherLookup,
    ) -> Result<&Recommendation, RecommendationError> {
        let overall = compute_kpis(&self.filtered(dataset)).overall_dtwl;
        self.recommendation = recommend(&self.selection.state, weather, overall)?;
        Ok(&self.recommendation)
    }

    /// Snapshot of the figures that head the downloadable report
    pub fn report_summary(&self, view: &FilteredView<'_>, weather: &WeatherLookup) -> ReportSummary {
        ReportSummary::new(
            &self.selection,
            compute_kpis(view).overall_dtwl,
            weather.temperature_c(),
            &self.recommendation,
        )
    }

    pub fn report(&self, dataset: &Dataset, weather: &WeatherLookup) -> Result<String> {
        let view = self.filtered(dataset);
        let summary = self.report_summary(&view, weather);
        build_report(&summary, &view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::enrich::classify_season;
    use crate::ingestion::types::{Column, Record, Schema, UnifiedTable};
    use crate::weather::WeatherData;
    use chrono::NaiveDate;

    fn record(state: &str, district: &str, block: &str, dtwl: f64) -> Record {
        let date = NaiveDate::from_ymd_opt(2020, 3, 1);
        Record {
            state: Some(state.to_string()),
            district: Some(district.to_string()),
            block: Some(block.to_string()),
            date,
            dtwl: Some(dtwl),
            season: Some(classify_season(date)),
            ..Default::default()
        }
    }

    fn dataset() -> Dataset {
        let schema: Schema = [
            Column::StateUt,
            Column::District,
            Column::Block,
            Column::Date,
            Column::Dtwl,
            Column::Season,
        ]
        .into_iter()
        .collect();

        Dataset::new(
            UnifiedTable::new(
                schema,
                vec![
                    record("Karnataka", "Mysuru", "Hunsur", 3.0),
                    record("Karnataka", "Mandya", "Maddur", 5.0),
                    record("Kerala", "Wayanad", "Kalpetta", 8.0),
                ],
            ),
            Vec::new(),
        )
    }

    fn weather() -> WeatherLookup {
        WeatherLookup::Available(WeatherData {
            temperature_c: 30.0,
            humidity_pct: 55.0,
        })
    }

    #[test]
    fn test_select_rejects_value_not_offered() {
        let dataset = dataset();
        let mut session = Session::new();

        let err = session
            .select(&dataset, Level::District, "Mysuru")
            .unwrap_err();
        assert_eq!(
            err,
            SelectionError::NotOffered {
                level: Level::District,
                value: "Mysuru".to_string()
            }
        );

        session.select(&dataset, Level::State, "Kerala").unwrap();
        assert!(session.select(&dataset, Level::District, "Mysuru").is_err());
        assert!(session.selection.district.is_empty());
    }

    #[test]
    fn test_changing_parent_clears_inconsistent_children() {
        let dataset = dataset();
        let mut session = Session::new();

        session.select(&dataset, Level::State, "Karnataka").unwrap();
        session.select(&dataset, Level::District, "Mysuru").unwrap();
        session.select(&dataset, Level::Block, "Hunsur").unwrap();

        session.select(&dataset, Level::State, "Kerala").unwrap();

        assert_eq!(session.selection.state, "Kerala");
        assert!(session.selection.district.is_empty());
        assert!(session.selection.block.is_empty());
    }

    #[test]
    fn test_options_cascade() {
        let dataset = dataset();
        let mut session = Session::new();
        session.select(&dataset, Level::State, "Karnataka").unwrap();

        let options = session.options(&dataset);

        assert_eq!(options[&Level::State], vec!["Karnataka", "Kerala"]);
        assert_eq!(options[&Level::District], vec!["Mandya", "Mysuru"]);
        assert!(options[&Level::Block].is_empty());
    }

    #[test]
    fn test_clear_restores_full_view() {
        let dataset = dataset();
        let mut session = Session::new();

        session.select(&dataset, Level::State, "Kerala").unwrap();
        session.set_query("kalpetta");
        session.set_page(Page::Report);
        session
            .generate_recommendation(&dataset, &weather())
            .unwrap();
        assert_eq!(session.filtered(&dataset).len(), 1);

        session.clear();

        assert!(session.selection.is_empty());
        assert_eq!(session.page, Page::Home);
        assert!(session.recommendation.is_placeholder());
        assert_eq!(session.filtered(&dataset).len(), dataset.table.len());
    }

    #[test]
    fn test_no_data_is_a_state_not_an_error() {
        let dataset = dataset();
        let mut session = Session::new();
        session.set_query("Rice");

        let view = session.dashboard(&dataset, WeatherLookup::Unavailable);

        assert!(view.no_data);
        assert_eq!(view.row_count, 0);
        assert_eq!(view.location, "All India");
        assert!(!view.kpis.overall_dtwl.is_available());
        assert!(session.trends(&dataset).iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_failed_recommendation_keeps_placeholder() {
        let dataset = dataset();
        let mut session = Session::new();

        let result = session.generate_recommendation(&dataset, &WeatherLookup::Unavailable);

        assert!(result.is_err());
        assert!(session.recommendation.is_placeholder());
    }

    #[test]
    fn test_report_reflects_session() {
        let dataset = dataset();
        let mut session = Session::new();
        session.select(&dataset, Level::State, "Karnataka").unwrap();

        let report = session.report(&dataset, &weather()).unwrap();

        assert!(report.starts_with("Metric,Value\nLocation - State,Karnataka\n"));
        assert!(report.contains("Overall DTWL (m),4.00"));
        assert!(report.contains("Temperature (°C),30.0"));
        assert!(report.contains("Mysuru"));
        assert!(!report.contains("Wayanad"));
    }
}
