//! Round record loading and raw-field parsing

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// Single CSV row with every field kept as raw text.
///
/// Count fields mix numbers and trailing prose ("4 kills"), so no numeric
/// coercion happens at load time. Columns that are absent from the header
/// row come back as `None` and are resolved per ingestion mode.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoundRecord {
    #[serde(rename = "Coordinate")]
    pub coordinate: Option<String>,
    #[serde(rename = "Kills")]
    pub kills: Option<String>,
    #[serde(rename = "Deaths")]
    pub deaths: Option<String>,
    #[serde(rename = "Differential")]
    pub differential: Option<String>,
}

/// Load all round records from a CSV file with a header row.
///
/// A missing or unreadable file is fatal. Rows the CSV reader cannot
/// deserialize (wrong field count and the like) are skipped with a warning;
/// malformed field contents are handled later, per row.
pub fn load_rounds(path: &Path) -> Result<Vec<RoundRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        match row {
            Ok(record) => records.push(record),
            Err(err) => warn!("Skipping unreadable CSV row: {err}"),
        }
    }
    Ok(records)
}

/// Parse a raw coordinate field into a (row, col) pair.
///
/// Strips quote characters and surrounding whitespace, then requires a
/// comma-separated pair of integers. Bounds are not checked here; the grid
/// write validates 0-9 on both axes.
pub fn parse_coordinate(raw: &str) -> Option<(i32, i32)> {
    let cleaned = raw.replace('"', "");
    let (row, col) = cleaned.trim().split_once(',')?;
    let row = row.trim().parse().ok()?;
    let col = col.trim().parse().ok()?;
    Some((row, col))
}

/// Extract the leading run of ASCII digits from a count field ("4 kills" -> 4).
///
/// Returns None when the field does not start with a digit; the caller
/// treats that row as invalid.
pub fn leading_count(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if end == 0 {
        return None;
    }
    trimmed[..end].parse().ok()
}

/// Extract a leading signed integer ("-2 rounds" -> -2, "+3" -> 3).
///
/// Used by the precomputed-differential ingestion mode.
pub fn leading_signed(raw: &str) -> Option<i32> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.strip_prefix(['+', '-']) {
        Some(rest) => (trimmed.starts_with('-'), rest),
        None => (false, trimmed),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i32 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
