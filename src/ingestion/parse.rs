//! Parse functions - transform raw data into typed Record structs

use crate::ingestion::enrich::tag_seasons;
use crate::ingestion::types::{Cell, Column, RawData, RawTable, Record, Schema, SourceFormat};
use crate::ingestion::utils::{normalize_code, normalize_name, parse_day_first_date, parse_number};
use anyhow::Result;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{info, warn};

/// Parse raw source bytes according to the source format
pub fn parse_source(raw: RawData, format: SourceFormat) -> Result<RawTable> {
    let bytes = raw.into_bytes()?;

    let table = match format {
        SourceFormat::Csv => parse_csv(&bytes)?,
        SourceFormat::Spreadsheet => parse_spreadsheet(&bytes)?,
    };

    if !table.is_empty() && !table.headers.iter().any(|h| h == Column::Date.header()) {
        return Err(anyhow::anyhow!(
            "Missing required column {}",
            Column::Date.header()
        ));
    }

    Ok(table)
}

/// Trim and upper-case a header so differently styled files line up
fn normalize_header(header: &str) -> String {
    header.trim().to_uppercase()
}

/// Parse delimited text with a header row
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable> {
    info!("Parsing CSV ({} bytes)", bytes.len());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    let mut rows = Vec::new();
    let mut parse_errors = 0;

    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(row) => {
                let cells = row
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect();
                rows.push(cells);
            }
            Err(e) => {
                parse_errors += 1;
                if parse_errors <= 10 {
                    // Only log first 10 errors
                    warn!("Failed to read CSV row {}: {}", idx, e);
                }
            }
        }
    }

    info!(
        "Parsed {} rows from CSV ({} errors)",
        rows.len(),
        parse_errors
    );

    Ok(RawTable { headers, rows })
}

/// Parse the first sheet of a workbook; the first row holds the headers
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<RawTable> {
    info!("Parsing spreadsheet ({} bytes)", bytes.len());

    let cursor = Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet_names.first() {
        Some(name) => name.clone(),
        None => return Err(anyhow::anyhow!("No sheets found in workbook")),
    };
    info!("Reading sheet: {}", sheet_name);

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut row_iter = range.rows();

    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| normalize_header(&cell.to_string()))
            .collect(),
        None => return Ok(RawTable::default()),
    };

    let rows: Vec<Vec<Cell>> = row_iter
        .map(|row| row.iter().map(spreadsheet_cell).collect())
        .collect();

    info!("Parsed {} rows from spreadsheet", rows.len());

    Ok(RawTable { headers, rows })
}

fn spreadsheet_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        other => match other.as_date() {
            Some(date) => Cell::Date(date),
            None => Cell::Text(other.to_string()),
        },
    }
}

/// Convert a parsed table into typed records plus the columns it carried
pub fn table_to_records(table: &RawTable) -> (Vec<Record>, Schema) {
    let mut positions: HashMap<Column, usize> = HashMap::new();
    for (idx, header) in table.headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            // First occurrence wins when a header repeats
            positions.entry(column).or_insert(idx);
        }
    }

    // SEASON is always derived, never read
    positions.remove(&Column::Season);

    let mut schema: Schema = positions.keys().copied().collect();
    let has_date = schema.contains(Column::Date);
    if has_date {
        schema.insert(Column::Season);
    }

    let records: Vec<Record> = table
        .rows
        .iter()
        .map(|row| {
            let cell = |column: Column| cell_at(row, &positions, column);

            Record {
                state: name_value(cell(Column::StateUt)),
                district: name_value(cell(Column::District)),
                block: name_value(cell(Column::Block)),
                village: name_value(cell(Column::Village)),
                pincode: code_value(cell(Column::Pincode)),
                date: date_value(cell(Column::Date)),
                dtwl: number_value(cell(Column::Dtwl)),
                latitude: number_value(cell(Column::Latitude)),
                longitude: number_value(cell(Column::Longitude)),
                season: None,
            }
        })
        .collect();

    let records = if has_date {
        tag_seasons(records)
    } else {
        records
    };

    (records, schema)
}

static EMPTY_CELL: Cell = Cell::Empty;

fn cell_at<'a>(row: &'a [Cell], positions: &HashMap<Column, usize>, column: Column) -> &'a Cell {
    positions
        .get(&column)
        .and_then(|idx| row.get(*idx))
        .unwrap_or(&EMPTY_CELL)
}

fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
    }
}

fn name_value(cell: &Cell) -> Option<String> {
    cell_text(cell).and_then(|s| normalize_name(&s))
}

fn code_value(cell: &Cell) -> Option<String> {
    cell_text(cell).and_then(|s| normalize_code(&s))
}

fn number_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => parse_number(s),
        _ => None,
    }
}

fn date_value(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(s) => parse_day_first_date(s),
        Cell::Number(n) => excel_serial_date(*n),
        Cell::Empty => None,
    }
}

/// Workbook serial day number (1900 date system) to a calendar date
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}
