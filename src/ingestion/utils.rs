//! Utility functions for common operations

use anyhow::Result;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// Download a file via HTTP
pub async fn http_get(url: &str, timeout: Duration) -> Result<Bytes> {
    info!("Downloading from {}", url);
    let client = Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(anyhow::anyhow!("HTTP request failed: {}", status));
    }

    let bytes = response.bytes().await?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

/// Clean an administrative name (state, district, block, village)
///
/// Whitespace runs collapse to one space, the result is trimmed and
/// title-cased. Blank cells and the literals "nan"/"None" become absent.
pub fn normalize_name(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    if is_missing(&collapsed) {
        return None;
    }
    Some(title_case(&collapsed))
}

/// Clean a code such as a pincode: trimmed, no spurious ".0" from numeric cells
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }

    match trimmed.strip_suffix(".0") {
        Some(whole) if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) => {
            Some(whole.to_string())
        }
        _ => Some(trimmed.to_string()),
    }
}

/// Parse a numeric cell, treating blanks and "nan" as absent
///
/// Commas are accepted only as thousands separators; anything else with a
/// comma (such as a decimal comma) is absent rather than misread.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }

    let plain = if trimmed.contains(',') {
        strip_thousands_separators(trimmed)?
    } else {
        trimmed.to_string()
    };

    plain.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// "1,234,567.8" to "1234567.8"; None unless every group after the first has three digits
fn strip_thousands_separators(value: &str) -> Option<String> {
    let (integer, fraction) = match value.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (value, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let unsigned = integer.trim_start_matches(['-', '+']);
    let mut groups = unsigned.split(',');
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 || !lead.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    Some(value.replace(',', ""))
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == "nan" || value == "None" || value == "NaN"
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;

    for c in value.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}

const DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%b-%Y", "%d %b %Y", "%Y-%m-%d", "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a date string, day-first
pub fn parse_day_first_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}
