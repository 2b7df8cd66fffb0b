//! CSV ingestion for declared schemas
//!
//! Reads a headered CSV into a raw [`Table`]: every declared column is located by
//! header name and every cell is kept as text. Type coercion happens later in
//! [`crate::clean`].

use std::io::Read;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Dataset, Schema, Table, Value};

/// Date formats tried in order when no configured format matches
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y", // 01/15/2024
    "%m/%d/%y", // 01/15/24
    "%Y-%m-%d", // 2024-01-15
    "%m-%d-%Y", // 01-15-2024
    "%d/%m/%Y", // 15/01/2024 (European)
];

/// Parse CSV data into a raw table with the declared schema
///
/// Columns not declared in the schema are ignored. A declared column that is
/// absent from the header fails with `MissingColumn`.
pub fn parse_csv<R: Read>(reader: R, schema: &Schema) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();

    let positions = schema
        .names()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::missing(name))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row = positions
            .iter()
            .map(|&pos| record.get(pos).map(Value::text).unwrap_or(Value::Missing))
            .collect();
        rows.push(row);
    }

    debug!(
        "Parsed {} rows across {} declared columns",
        rows.len(),
        schema.len()
    );
    Table::new(schema.clone(), rows)
}

/// Detect the dataset family from a CSV header line
///
/// Returns None if the layout is not recognized.
pub fn detect_dataset(header: &str) -> Option<Dataset> {
    let columns: Vec<&str> = header
        .trim()
        .split(',')
        .map(|c| c.trim().trim_matches('"'))
        .collect();
    let has = |name: &str| columns.iter().any(|c| *c == name);

    // Superstore: "Row ID,Order ID,Order Date,Ship Date,...,Category,Sub-Category,Sales,..."
    if has("Order Date") && has("Sales") && has("Category") {
        return Some(Dataset::Sales);
    }

    // Telco: "customerID,gender,SeniorCitizen,...,tenure,...,TotalCharges,Churn"
    if has("customerID") && has("Churn") && has("tenure") {
        return Some(Dataset::Churn);
    }

    None
}

/// Parse a date string, trying configured formats before the defaults
pub fn parse_date(s: &str, extra_formats: &[String]) -> Option<NaiveDate> {
    let s = s.trim();

    extra_formats
        .iter()
        .map(String::as_str)
        .chain(DEFAULT_DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a numeric string, handling currency symbols and thousands separators
///
/// Parenthesised values are negative. Blank or non-finite input yields None.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
