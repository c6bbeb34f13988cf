//! KPIs, seasonal trend series and map points for a filtered view

use crate::filter::FilteredView;
use crate::ingestion::types::{Column, Record, Season};
use chrono::Datelike;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// An aggregate that may be undefined, shown as "N/A" when it is
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metric(pub Option<f64>);

impl Metric {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_available(&self) -> bool {
        self.0.is_some()
    }

    /// Fixed-precision text, or "N/A"
    pub fn format(&self, decimals: usize) -> String {
        match self.0 {
            Some(v) => format!("{:.*}", decimals, v),
            None => Self::NOT_AVAILABLE.to_string(),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_str(Self::NOT_AVAILABLE),
        }
    }
}

/// Headline numbers for the current selection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Kpis {
    pub overall_dtwl: Metric,
    pub current_dtwl: Metric,
    pub premonsoon_dtwl: Metric,
    pub postmonsoon_dtwl: Metric,
}

fn mean<'a>(values: impl Iterator<Item = &'a Record>) -> Metric {
    let (sum, count) = values
        .filter_map(|r| r.dtwl)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        Metric(None)
    } else {
        Metric(Some(sum / count as f64))
    }
}

/// Latest record by date; ties go to the one appearing last
pub fn latest_record<'a>(view: &FilteredView<'a>) -> Option<&'a Record> {
    if !view.has(Column::Date) {
        return None;
    }
    view.records
        .iter()
        .copied()
        .filter(|r| r.date.is_some())
        .max_by_key(|r| r.date)
}

pub fn compute_kpis(view: &FilteredView<'_>) -> Kpis {
    let in_season = |season: Season| {
        view.records
            .iter()
            .copied()
            .filter(move |r| r.season == Some(season))
    };

    Kpis {
        overall_dtwl: mean(view.records.iter().copied()),
        current_dtwl: Metric(latest_record(view).and_then(|r| r.dtwl)),
        premonsoon_dtwl: mean(in_season(Season::Premonsoon)),
        postmonsoon_dtwl: mean(in_season(Season::Postmonsoon)),
    }
}

/// Which seasons feed a trend line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Premonsoon,
    Postmonsoon,
    Overall,
}

impl Trend {
    pub const ALL: [Trend; 3] = [Trend::Premonsoon, Trend::Postmonsoon, Trend::Overall];

    fn includes(&self, season: Option<Season>) -> bool {
        match self {
            Trend::Premonsoon => season == Some(Season::Premonsoon),
            Trend::Postmonsoon => season == Some(Season::Postmonsoon),
            Trend::Overall => matches!(
                season,
                Some(Season::Premonsoon) | Some(Season::Postmonsoon)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub dtwl: f64,
}

/// Mean DTWL per calendar year, ascending by year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub trend: Trend,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The premonsoon, postmonsoon and overall series; empty without a DATE column
pub fn trend_series(view: &FilteredView<'_>) -> Vec<TrendSeries> {
    if !view.has(Column::Date) {
        return Vec::new();
    }

    Trend::ALL
        .into_iter()
        .map(|trend| {
            let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
            for record in view.records.iter().filter(|r| trend.includes(r.season)) {
                if let (Some(date), Some(dtwl)) = (record.date, record.dtwl) {
                    let acc = by_year.entry(date.year()).or_insert((0.0, 0));
                    acc.0 += dtwl;
                    acc.1 += 1;
                }
            }

            TrendSeries {
                trend,
                points: by_year
                    .into_iter()
                    .map(|(year, (sum, count))| TrendPoint {
                        year,
                        dtwl: sum / count as f64,
                    })
                    .collect(),
            }
        })
        .collect()
}

type PlaceKey<'a> = [Option<&'a str>; 4];

const PLACE_COLUMNS: [Column; 4] = [
    Column::StateUt,
    Column::District,
    Column::Block,
    Column::Village,
];

/// Latest located reading per (state, district, block, village)
///
/// Rows missing a loaded location column are left out, mirroring how
/// groups with no key are dropped. Output keeps ascending date order.
pub fn latest_by_place<'a>(view: &FilteredView<'a>) -> Vec<&'a Record> {
    if !view.has(Column::Latitude) || !view.has(Column::Longitude) {
        return Vec::new();
    }

    let mut located: Vec<&Record> = view
        .records
        .iter()
        .copied()
        .filter(|r| r.latitude.is_some() && r.longitude.is_some())
        .filter(|r| {
            PLACE_COLUMNS
                .iter()
                .all(|c| !view.has(*c) || r.location(*c).is_some())
        })
        .collect();
    located.sort_by_key(|r| r.date);

    let mut last_of: HashMap<PlaceKey<'_>, usize> = HashMap::new();
    for (idx, record) in located.iter().enumerate() {
        let key = PLACE_COLUMNS.map(|c| record.location(c));
        last_of.insert(key, idx);
    }

    let mut keep: Vec<usize> = last_of.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|idx| located[idx]).collect()
}

/// Map layer: one point per place, coloured and sized by DTWL downstream
pub fn map_points(view: &FilteredView<'_>) -> FeatureCollection {
    let features = latest_by_place(view)
        .into_iter()
        .filter_map(|record| {
            let (lat, lon) = (record.latitude?, record.longitude?);

            let mut properties = JsonObject::new();
            properties.insert(
                "village".to_string(),
                serde_json::json!(record.village.as_deref()),
            );
            properties.insert("dtwl".to_string(), serde_json::json!(record.dtwl));
            properties.insert(
                "date".to_string(),
                serde_json::json!(record.date.map(|d| d.to_string())),
            );

            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
