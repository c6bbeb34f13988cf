//! Downloadable report: a metric summary followed by the filtered raw rows

use crate::filter::{FilteredView, Level, LocationSelection};
use crate::recommend::Recommendation;
use crate::stats::Metric;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

pub const REPORT_FILE_NAME: &str = "groundwater_report.csv";
pub const RAW_DATA_SEPARATOR: &str = "\n\n--- RAW DATA ---\n\n";

/// Key figures written above the raw data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub selection: LocationSelection,
    pub overall_dtwl: Metric,
    pub temperature_c: Option<f64>,
    pub soil_type: String,
    pub recommended_crops: String,
}

impl ReportSummary {
    pub fn new(
        selection: &LocationSelection,
        overall_dtwl: Metric,
        temperature_c: Option<f64>,
        recommendation: &Recommendation,
    ) -> Self {
        ReportSummary {
            selection: selection.clone(),
            overall_dtwl,
            temperature_c,
            soil_type: recommendation.soil_type.clone(),
            recommended_crops: recommendation.crops.clone(),
        }
    }

    /// "Metric,Value" block
    pub fn to_csv(&self) -> String {
        let mut lines = vec!["Metric,Value".to_string()];

        for level in Level::ALL {
            let value = self.selection.get(level);
            let value = if value.is_empty() {
                Metric::NOT_AVAILABLE
            } else {
                value
            };
            lines.push(format!(
                "Location - {},{}",
                level_title(level),
                escape_field(value)
            ));
        }

        lines.push("---,---".to_string());
        lines.push(format!("Overall DTWL (m),{}", self.overall_dtwl.format(2)));
        lines.push(format!(
            "Temperature (°C),{}",
            Metric(self.temperature_c).format(1)
        ));
        lines.push(format!("Predicted Soil Type,{}", quote(&self.soil_type)));
        lines.push(format!("Recommended Crops,{}", quote(&self.recommended_crops)));

        lines.join("\n")
    }
}

fn level_title(level: Level) -> &'static str {
    match level {
        Level::State => "State",
        Level::District => "District",
        Level::Block => "Block",
        Level::Village => "Village",
        Level::Pincode => "Pincode",
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        quote(value)
    } else {
        value.to_string()
    }
}

/// Serialize the filtered rows, loaded columns only, with a header row
pub fn raw_data_csv(view: &FilteredView<'_>) -> Result<String> {
    let columns: Vec<_> = view.schema.columns().collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(|c| c.header()))?;
    for record in &view.records {
        writer.write_record(columns.iter().map(|c| record.field_text(*c)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush report rows: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Full report artifact: summary, separator, raw rows
pub fn build_report(summary: &ReportSummary, view: &FilteredView<'_>) -> Result<String> {
    let report = format!(
        "{}{}{}",
        summary.to_csv(),
        RAW_DATA_SEPARATOR,
        raw_data_csv(view)?
    );

    info!(
        "Built report for {} ({} rows, {} bytes)",
        summary.selection.label(),
        view.len(),
        report.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::{Column, Record, Schema, Season, UnifiedTable};
    use chrono::NaiveDate;

    fn sample_table() -> UnifiedTable {
        let schema: Schema = [
            Column::StateUt,
            Column::District,
            Column::Date,
            Column::Dtwl,
            Column::Season,
        ]
        .into_iter()
        .collect();

        UnifiedTable::new(
            schema,
            vec![Record {
                state: Some("Kerala".to_string()),
                district: Some("Wayanad".to_string()),
                date: NaiveDate::from_ymd_opt(2020, 11, 5),
                dtwl: Some(6.0),
                season: Some(Season::Postmonsoon),
                ..Default::default()
            }],
        )
    }

    #[test]
    fn test_report_layout() {
        let table = sample_table();
        let view = FilteredView::all(&table);
        let selection = LocationSelection {
            state: "Kerala".to_string(),
            ..Default::default()
        };
        let summary = ReportSummary::new(
            &selection,
            Metric(Some(6.0)),
            None,
            &Recommendation::placeholder(),
        );

        let report = build_report(&summary, &view).unwrap();

        let expected = "Metric,Value\n\
Location - State,Kerala\n\
Location - District,N/A\n\
Location - Block,N/A\n\
Location - Village,N/A\n\
Location - Pincode,N/A\n\
---,---\n\
Overall DTWL (m),6.00\n\
Temperature (°C),N/A\n\
Predicted Soil Type,\"Click Generate\"\n\
Recommended Crops,\"\"\n\
\n\
--- RAW DATA ---\n\
\n\
STATE_UT,DISTRICT,DATE,DTWL,SEASON\n\
Kerala,Wayanad,2020-11-05,6.0,Postmonsoon\n";

        assert_eq!(report, expected);
    }

    #[test]
    fn test_summary_with_weather_and_recommendation() {
        let recommendation = Recommendation {
            soil_type: "Alluvial Soil".to_string(),
            crops: "Rice, Wheat, Sugarcane".to_string(),
        };
        let summary = ReportSummary::new(
            &LocationSelection::default(),
            Metric(Some(4.0)),
            Some(31.26),
            &recommendation,
        );

        let text = summary.to_csv();

        assert!(text.contains("Temperature (°C),31.3"));
        assert!(text.contains("Recommended Crops,\"Rice, Wheat, Sugarcane\""));
        assert!(text.contains("Location - State,N/A"));
    }

    #[test]
    fn test_empty_view_still_has_header() {
        let table = sample_table();
        let view = FilteredView {
            schema: &table.schema,
            records: Vec::new(),
        };

        let raw = raw_data_csv(&view).unwrap();
        assert_eq!(raw, "STATE_UT,DISTRICT,DATE,DTWL,SEASON\n");
    }
}
