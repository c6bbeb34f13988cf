//! Cascading lookups that populate the location menus

use crate::filter::{Level, LocationSelection};
use crate::ingestion::types::{Column, UnifiedTable};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

type ChildMap = BTreeMap<String, Vec<String>>;

/// Parent value to sorted distinct child values, one map per level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationIndex {
    pub states: Vec<String>,
    pub districts_by_state: ChildMap,
    pub blocks_by_district: ChildMap,
    pub villages_by_block: ChildMap,
    pub pincodes_by_village: ChildMap,
}

impl LocationIndex {
    pub fn build(table: &UnifiedTable) -> Self {
        let states = if table.has(Column::StateUt) {
            table
                .records
                .iter()
                .filter_map(|r| r.state.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };

        let index = LocationIndex {
            states,
            districts_by_state: group_children(table, Column::StateUt, Column::District),
            blocks_by_district: group_children(table, Column::District, Column::Block),
            villages_by_block: group_children(table, Column::Block, Column::Village),
            pincodes_by_village: group_children(table, Column::Village, Column::Pincode),
        };

        info!(
            "Built location index: {} states, {} districts, {} blocks, {} villages",
            index.states.len(),
            index.districts_by_state.values().map(Vec::len).sum::<usize>(),
            index.blocks_by_district.values().map(Vec::len).sum::<usize>(),
            index.villages_by_block.values().map(Vec::len).sum::<usize>(),
        );

        index
    }

    /// Children recorded under `parent` at `level`; empty for unseen parents
    pub fn children(&self, level: Level, parent: &str) -> &[String] {
        let map = match level {
            Level::State => return &self.states,
            Level::District => &self.districts_by_state,
            Level::Block => &self.blocks_by_district,
            Level::Village => &self.villages_by_block,
            Level::Pincode => &self.pincodes_by_village,
        };

        map.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Values a menu at `level` offers for the current selection
    pub fn options(&self, level: Level, selection: &LocationSelection) -> &[String] {
        match level.parent() {
            None => &self.states,
            Some(parent) => self.children(level, selection.get(parent)),
        }
    }
}

/// Sorted distinct child values per parent; empty when either column is missing
fn group_children(table: &UnifiedTable, parent: Column, child: Column) -> ChildMap {
    if !table.has(parent) || !table.has(child) {
        return ChildMap::new();
    }

    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in &table.records {
        let Some(key) = record.location(parent) else {
            continue;
        };
        let entry = grouped.entry(key.to_string()).or_default();
        if let Some(value) = record.location(child) {
            entry.insert(value.to_string());
        }
    }

    grouped
        .into_iter()
        .map(|(k, v)| (k, v.into_iter().collect()))
        .collect()
}
