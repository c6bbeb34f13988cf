//! Location selection and the filter it drives

use crate::ingestion::types::{Column, Record, Schema, UnifiedTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Administrative levels, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    State,
    District,
    Block,
    Village,
    Pincode,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::State,
        Level::District,
        Level::Block,
        Level::Village,
        Level::Pincode,
    ];

    pub fn column(&self) -> Column {
        match self {
            Level::State => Column::StateUt,
            Level::District => Column::District,
            Level::Block => Column::Block,
            Level::Village => Column::Village,
            Level::Pincode => Column::Pincode,
        }
    }

    pub fn parent(&self) -> Option<Level> {
        match self {
            Level::State => None,
            Level::District => Some(Level::State),
            Level::Block => Some(Level::District),
            Level::Village => Some(Level::Block),
            Level::Pincode => Some(Level::Village),
        }
    }

    /// Levels strictly below this one
    pub fn below(&self) -> impl Iterator<Item = Level> {
        let this = *self;
        Level::ALL.into_iter().skip_while(move |l| *l != this).skip(1)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::State => write!(f, "state"),
            Level::District => write!(f, "district"),
            Level::Block => write!(f, "block"),
            Level::Village => write!(f, "village"),
            Level::Pincode => write!(f, "pincode"),
        }
    }
}

/// Five cascading filters; an empty string means "no filter at this level"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSelection {
    pub state: String,
    pub district: String,
    pub block: String,
    pub village: String,
    pub pincode: String,
}

impl LocationSelection {
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::State => &self.state,
            Level::District => &self.district,
            Level::Block => &self.block,
            Level::Village => &self.village,
            Level::Pincode => &self.pincode,
        }
    }

    pub fn set(&mut self, level: Level, value: impl Into<String>) {
        let value = value.into();
        match level {
            Level::State => self.state = value,
            Level::District => self.district = value,
            Level::Block => self.block = value,
            Level::Village => self.village = value,
            Level::Pincode => self.pincode = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        Level::ALL.iter().all(|l| self.get(*l).is_empty())
    }

    /// "State -> District -> Block -> Village", or "All India" with nothing chosen
    pub fn label(&self) -> String {
        let parts: Vec<&str> = [Level::State, Level::District, Level::Block, Level::Village]
            .iter()
            .map(|l| self.get(*l))
            .filter(|v| !v.is_empty())
            .collect();

        if parts.is_empty() {
            "All India".to_string()
        } else {
            parts.join(" -> ")
        }
    }
}

/// Rows of the unified table that survive the active filters
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    pub schema: &'a Schema,
    pub records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    /// Every row, no filter applied
    pub fn all(table: &'a UnifiedTable) -> Self {
        FilteredView {
            schema: &table.schema,
            records: table.records.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has(&self, column: Column) -> bool {
        self.schema.contains(column)
    }
}

/// Apply the selection level by level, then the free-text query
pub fn apply_filter<'a>(
    table: &'a UnifiedTable,
    selection: &LocationSelection,
    query: Option<&str>,
) -> FilteredView<'a> {
    let mut view = FilteredView::all(table);

    for level in Level::ALL {
        let wanted = selection.get(level);
        if wanted.is_empty() {
            continue;
        }
        let column = level.column();
        if !table.has(column) {
            debug!("Skipping {} filter, column {} not loaded", level, column);
            continue;
        }
        view.records.retain(|r| r.location(column) == Some(wanted));
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        let schema = &table.schema;
        view.records
            .retain(|r| search_text(r, schema).contains(&needle));
    }

    debug!(
        "Filter {:?} (query {:?}) kept {} of {} rows",
        selection,
        query,
        view.len(),
        table.len()
    );

    view
}

/// Lower-cased text of every loaded column of a row
pub fn search_text(record: &Record, schema: &Schema) -> String {
    schema
        .columns()
        .map(|c| record.field_text(c))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(state: &str, district: &str, village: &str, dtwl: f64) -> Record {
        Record {
            state: Some(state.to_string()),
            district: Some(district.to_string()),
            village: Some(village.to_string()),
            date: NaiveDate::from_ymd_opt(2020, 1, 1),
            dtwl: Some(dtwl),
            ..Default::default()
        }
    }

    fn sample_table() -> UnifiedTable {
        let schema: Schema = [
            Column::StateUt,
            Column::District,
            Column::Village,
            Column::Date,
            Column::Dtwl,
        ]
        .into_iter()
        .collect();

        UnifiedTable::new(
            schema,
            vec![
                record("Karnataka", "Mysuru", "Bilikere", 3.0),
                record("Karnataka", "Mandya", "Maddur", 5.0),
                record("Kerala", "Wayanad", "Meppadi", 8.0),
            ],
        )
    }

    #[test]
    fn test_empty_selection_passes_everything() {
        let table = sample_table();
        let view = apply_filter(&table, &LocationSelection::default(), None);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn test_rows_match_every_active_predicate() {
        let table = sample_table();
        let selection = LocationSelection {
            state: "Karnataka".to_string(),
            district: "Mandya".to_string(),
            ..Default::default()
        };

        let view = apply_filter(&table, &selection, None);

        assert_eq!(view.len(), 1);
        assert!(view
            .records
            .iter()
            .all(|r| r.state.as_deref() == Some("Karnataka")
                && r.district.as_deref() == Some("Mandya")));
    }

    #[test]
    fn test_filter_on_missing_column_is_skipped() {
        let table = sample_table();
        let selection = LocationSelection {
            state: "Kerala".to_string(),
            block: "Kalpetta".to_string(),
            ..Default::default()
        };

        let view = apply_filter(&table, &selection, None);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let table = sample_table();
        let selection = LocationSelection {
            state: "Karnataka".to_string(),
            ..Default::default()
        };

        let first: Vec<Record> = apply_filter(&table, &selection, Some("ma"))
            .records
            .into_iter()
            .cloned()
            .collect();
        let second: Vec<Record> = apply_filter(&table, &selection, Some("ma"))
            .records
            .into_iter()
            .cloned()
            .collect();

        assert_eq!(first, second);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_free_text_is_case_insensitive() {
        let table = sample_table();
        let view = apply_filter(&table, &LocationSelection::default(), Some("MEPPADI"));
        assert_eq!(view.len(), 1);
        assert_eq!(view.records[0].state.as_deref(), Some("Kerala"));
    }

    #[test]
    fn test_free_text_without_match_is_empty() {
        let table = sample_table();
        let view = apply_filter(&table, &LocationSelection::default(), Some("Rice"));
        assert!(view.is_empty());
    }

    #[test]
    fn test_label() {
        let mut selection = LocationSelection::default();
        assert_eq!(selection.label(), "All India");

        selection.state = "Kerala".to_string();
        selection.district = "Wayanad".to_string();
        selection.pincode = "673577".to_string();
        assert_eq!(selection.label(), "Kerala -> Wayanad");
    }

    #[test]
    fn test_levels_below() {
        let below: Vec<Level> = Level::District.below().collect();
        assert_eq!(below, vec![Level::Block, Level::Village, Level::Pincode]);
        assert_eq!(Level::Pincode.below().count(), 0);
    }
}
