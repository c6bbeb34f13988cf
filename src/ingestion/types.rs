//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior beyond small accessors

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Raw data from a source - tagged union
#[derive(Debug)]
pub enum RawData {
    File(PathBuf),
    Bytes(Bytes),
}

impl RawData {
    /// Read the payload into memory regardless of where it lives
    pub fn into_bytes(self) -> anyhow::Result<Bytes> {
        match self {
            RawData::File(path) => Ok(Bytes::from(std::fs::read(&path)?)),
            RawData::Bytes(bytes) => Ok(bytes),
        }
    }
}

/// File formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Decide the format from a file name's extension
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(SourceFormat::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(SourceFormat::Spreadsheet)
        } else {
            None
        }
    }
}

/// One configured input file, either remote or on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    pub name: String,
    pub location: String,
}

impl SourceFile {
    /// Join a base (URL or directory) with a file name
    pub fn new(base: &str, name: &str) -> Self {
        let location = if base.is_empty() {
            name.to_string()
        } else if base.ends_with('/') {
            format!("{}{}", base, name)
        } else {
            format!("{}/{}", base, name)
        };

        SourceFile {
            name: name.to_string(),
            location,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    pub fn format(&self) -> Option<SourceFormat> {
        SourceFormat::from_name(&self.name)
    }
}

/// A single cell as read from CSV or a workbook
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Header plus rows, before any typing
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Columns the dashboard knows about, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    StateUt,
    District,
    Block,
    Village,
    Pincode,
    Latitude,
    Longitude,
    Date,
    Dtwl,
    Season,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::StateUt,
        Column::District,
        Column::Block,
        Column::Village,
        Column::Pincode,
        Column::Latitude,
        Column::Longitude,
        Column::Date,
        Column::Dtwl,
        Column::Season,
    ];

    /// Upper-case header name as it appears in the source files
    pub fn header(&self) -> &'static str {
        match self {
            Column::StateUt => "STATE_UT",
            Column::District => "DISTRICT",
            Column::Block => "BLOCK",
            Column::Village => "VILLAGE",
            Column::Pincode => "PINCODE",
            Column::Latitude => "LATITUDE",
            Column::Longitude => "LONGITUDE",
            Column::Date => "DATE",
            Column::Dtwl => "DTWL",
            Column::Season => "SEASON",
        }
    }

    /// Match an already normalized (trimmed, upper-cased) header
    pub fn from_header(header: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.header() == header)
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// The set of columns present in at least one loaded source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema(BTreeSet<Column>);

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn insert(&mut self, column: Column) {
        self.0.insert(column);
    }

    pub fn contains(&self, column: Column) -> bool {
        self.0.contains(&column)
    }

    pub fn merge(&mut self, other: &Schema) {
        self.0.extend(other.0.iter().copied());
    }

    /// Present columns in report order
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Column> for Schema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Schema(iter.into_iter().collect())
    }
}

/// Season bucket derived from the measurement month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Unknown,
    Premonsoon,
    Postmonsoon,
    Other,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Unknown => write!(f, "Unknown"),
            Season::Premonsoon => write!(f, "Premonsoon"),
            Season::Postmonsoon => write!(f, "Postmonsoon"),
            Season::Other => write!(f, "Other"),
        }
    }
}

/// One water level observation - every field may be missing from a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    // Location
    pub state: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub village: Option<String>,
    pub pincode: Option<String>,

    // Measurement
    pub date: Option<NaiveDate>,
    pub dtwl: Option<f64>,

    // Geolocation
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Derived, None when the source had no DATE column
    pub season: Option<Season>,
}

impl Record {
    /// Text value of a location column
    pub fn location(&self, column: Column) -> Option<&str> {
        match column {
            Column::StateUt => self.state.as_deref(),
            Column::District => self.district.as_deref(),
            Column::Block => self.block.as_deref(),
            Column::Village => self.village.as_deref(),
            Column::Pincode => self.pincode.as_deref(),
            _ => None,
        }
    }

    /// Cell text as written to the report, empty when absent
    pub fn field_text(&self, column: Column) -> String {
        match column {
            Column::StateUt
            | Column::District
            | Column::Block
            | Column::Village
            | Column::Pincode => self.location(column).unwrap_or_default().to_string(),
            Column::Latitude => format_float(self.latitude),
            Column::Longitude => format_float(self.longitude),
            Column::Date => self
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            Column::Dtwl => format_float(self.dtwl),
            Column::Season => self.season.map(|s| s.to_string()).unwrap_or_default(),
        }
    }
}

/// Floats keep a trailing ".0" so whole metres stay recognisable as decimals
fn format_float(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", v)).unwrap_or_default()
}

/// Every record from every source, in order of appearance
#[derive(Debug, Clone, Default)]
pub struct UnifiedTable {
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl UnifiedTable {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        UnifiedTable { schema, records }
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

/// A source that could not be used, surfaced to the user without stopping the load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceWarning {
    pub source: String,
    pub message: String,
}

impl std::fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Could not read {}: {}", self.source, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_from_name() {
        assert_eq!(SourceFormat::from_name("a.csv"), Some(SourceFormat::Csv));
        assert_eq!(
            SourceFormat::from_name("January.XLSX"),
            Some(SourceFormat::Spreadsheet)
        );
        assert_eq!(SourceFormat::from_name("notes.txt"), None);
    }

    #[test]
    fn test_source_file_join() {
        let remote = SourceFile::new("https://example.com/data/", "a.csv");
        assert_eq!(remote.location, "https://example.com/data/a.csv");
        assert!(remote.is_remote());

        let local = SourceFile::new("/srv/dwlr", "b.xlsx");
        assert_eq!(local.location, "/srv/dwlr/b.xlsx");
        assert!(!local.is_remote());
    }

    #[test]
    fn test_field_text() {
        let record = Record {
            state: Some("Karnataka".to_string()),
            date: NaiveDate::from_ymd_opt(2020, 1, 15),
            dtwl: Some(2.0),
            season: Some(Season::Premonsoon),
            ..Default::default()
        };

        assert_eq!(record.field_text(Column::StateUt), "Karnataka");
        assert_eq!(record.field_text(Column::District), "");
        assert_eq!(record.field_text(Column::Date), "2020-01-15");
        assert_eq!(record.field_text(Column::Dtwl), "2.0");
        assert_eq!(record.field_text(Column::Season), "Premonsoon");
    }

    #[test]
    fn test_schema_order() {
        let schema: Schema = [Column::Dtwl, Column::StateUt, Column::Date]
            .into_iter()
            .collect();
        let columns: Vec<Column> = schema.columns().collect();
        assert_eq!(columns, vec![Column::StateUt, Column::Date, Column::Dtwl]);
    }
}
