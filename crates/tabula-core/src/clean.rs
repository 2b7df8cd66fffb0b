//! Table cleaning: type coercion, duplicate removal and derived columns
//!
//! The cleaner is the only place column types are checked. Everything
//! downstream can assume numeric columns hold numbers (or missing), date
//! columns hold dates (or missing), and required columns are populated.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::import::{parse_date, parse_number};
use crate::models::{Column, ColumnType, Record, Schema, Table, Value};

/// A derived `numerator / denominator` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioSpec {
    /// Name of the derived column (e.g. "Profit Margin")
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

impl RatioSpec {
    pub fn new(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }
}

/// Cleaning options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Date formats tried before the built-in ones
    pub date_formats: Vec<String>,
    /// Ratio columns to derive when their sources exist
    pub ratios: Vec<RatioSpec>,
    /// Derive Year/Month/Quarter from date columns
    pub calendar: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            date_formats: vec![],
            ratios: vec![],
            calendar: true,
        }
    }
}

/// Row accounting for one cleaning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    /// Dropped for an unparseable date in a required column
    pub invalid_dates: usize,
    /// Dropped for a missing value in a required column
    pub missing_required: usize,
    pub duplicates_removed: usize,
    pub output_rows: usize,
}

/// Result of cleaning a table
#[derive(Debug, Clone, PartialEq)]
pub enum CleanOutcome {
    /// At least one row survived
    Table { table: Table, report: CleanReport },
    /// Nothing survived; the output schema is still reported
    Empty { schema: Schema, report: CleanReport },
}

impl CleanOutcome {
    pub fn report(&self) -> &CleanReport {
        match self {
            CleanOutcome::Table { report, .. } | CleanOutcome::Empty { report, .. } => report,
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            CleanOutcome::Table { table, .. } => table.schema(),
            CleanOutcome::Empty { schema, .. } => schema,
        }
    }

    pub fn table(&self) -> Option<&Table> {
        match self {
            CleanOutcome::Table { table, .. } => Some(table),
            CleanOutcome::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CleanOutcome::Empty { .. })
    }

    /// The cleaned table, or `EmptyInput` when no rows survived
    pub fn into_table(self) -> Result<Table> {
        match self {
            CleanOutcome::Table { table, .. } => Ok(table),
            CleanOutcome::Empty { report, .. } => Err(Error::EmptyInput(format!(
                "no usable rows after cleaning ({} input rows)",
                report.input_rows
            ))),
        }
    }
}

/// A derived column and how to compute it from a coerced row
enum Derivation {
    Ratio { numerator: usize, denominator: usize },
    Year(usize),
    Month(usize),
    Quarter(usize),
}

impl Derivation {
    fn compute(&self, row: &Record) -> Value {
        match self {
            Derivation::Ratio {
                numerator,
                denominator,
            } => match (row[*numerator].as_f64(), row[*denominator].as_f64()) {
                (Some(n), Some(d)) if d != 0.0 => Value::Number(n / d),
                _ => Value::Missing,
            },
            Derivation::Year(idx) => calendar_part(&row[*idx], |d| d.year() as f64),
            Derivation::Month(idx) => calendar_part(&row[*idx], |d| d.month() as f64),
            Derivation::Quarter(idx) => {
                calendar_part(&row[*idx], |d| ((d.month() - 1) / 3 + 1) as f64)
            }
        }
    }
}

fn calendar_part(value: &Value, part: impl Fn(NaiveDate) -> f64) -> Value {
    value
        .as_date()
        .map(|d| Value::Number(part(d)))
        .unwrap_or(Value::Missing)
}

/// Clean a raw table into a new table
///
/// The input is never modified. When no rows survive, the outcome is
/// [`CleanOutcome::Empty`] rather than an error.
pub fn clean(raw: &Table, options: &CleanOptions) -> Result<CleanOutcome> {
    let base = raw.schema();
    let (schema, derivations) = derive_schema(base, options)?;

    let mut report = CleanReport {
        input_rows: raw.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(raw.len());

    for raw_row in raw.rows() {
        let row = match coerce_row(base, raw_row, &options.date_formats) {
            Coerced::Row(row) => row,
            Coerced::InvalidDate => {
                report.invalid_dates += 1;
                continue;
            }
        };

        let missing_required = base
            .columns()
            .iter()
            .zip(&row)
            .any(|(col, value)| col.required && value.is_missing());
        if missing_required {
            report.missing_required += 1;
            continue;
        }

        if !seen.insert(fingerprint(&row)) {
            report.duplicates_removed += 1;
            continue;
        }

        let mut row = row;
        for derivation in &derivations {
            let value = derivation.compute(&row);
            row.push(value);
        }
        rows.push(row);
    }

    report.output_rows = rows.len();
    info!(
        input = report.input_rows,
        invalid_dates = report.invalid_dates,
        missing_required = report.missing_required,
        duplicates = report.duplicates_removed,
        output = report.output_rows,
        "Table cleaning complete"
    );

    if rows.is_empty() {
        return Ok(CleanOutcome::Empty { schema, report });
    }

    let table = Table::new(schema, rows)?;
    Ok(CleanOutcome::Table { table, report })
}

/// Extend the base schema with derived columns
fn derive_schema(base: &Schema, options: &CleanOptions) -> Result<(Schema, Vec<Derivation>)> {
    let mut schema = base.clone();
    let mut derivations = Vec::new();

    for ratio in &options.ratios {
        let (Some(numerator), Some(denominator)) = (
            base.index_of(&ratio.numerator),
            base.index_of(&ratio.denominator),
        ) else {
            debug!(ratio = %ratio.name, "Ratio sources absent, skipping");
            continue;
        };

        for idx in [numerator, denominator] {
            let col = &base.columns()[idx];
            if col.column_type != ColumnType::Numeric {
                return Err(Error::config(format!(
                    "Ratio {} uses non-numeric column {}",
                    ratio.name, col.name
                )));
            }
        }

        if schema.contains(&ratio.name) {
            warn!(ratio = %ratio.name, "Column already exists, skipping ratio");
            continue;
        }

        schema.push(Column::numeric(ratio.name.clone()))?;
        derivations.push(Derivation::Ratio {
            numerator,
            denominator,
        });
    }

    if options.calendar {
        let date_columns: Vec<(usize, String)> = base
            .of_type(ColumnType::Date)
            .map(|(idx, col)| (idx, col.name.clone()))
            .collect();
        let prefixed = date_columns.len() > 1;

        for (idx, name) in date_columns {
            let parts = [
                ("Year", Derivation::Year(idx)),
                ("Month", Derivation::Month(idx)),
                ("Quarter", Derivation::Quarter(idx)),
            ];
            for (part, derivation) in parts {
                let column = if prefixed {
                    format!("{} {}", name, part)
                } else {
                    part.to_string()
                };
                if schema.contains(&column) {
                    warn!(column = %column, "Column already exists, skipping calendar part");
                    continue;
                }
                schema.push(Column::numeric(column))?;
                derivations.push(derivation);
            }
        }
    }

    Ok((schema, derivations))
}

enum Coerced {
    Row(Record),
    InvalidDate,
}

/// Coerce every cell to its declared type
fn coerce_row(schema: &Schema, raw: &Record, date_formats: &[String]) -> Coerced {
    let mut row = Vec::with_capacity(raw.len());

    for (col, value) in schema.columns().iter().zip(raw) {
        let coerced = match (col.column_type, value) {
            (_, Value::Missing) => Value::Missing,
            (ColumnType::Numeric, Value::Number(n)) => Value::Number(*n),
            (ColumnType::Numeric, Value::Text(s)) => {
                parse_number(s).map(Value::Number).unwrap_or(Value::Missing)
            }
            (ColumnType::Numeric, Value::Date(_)) => Value::Missing,
            (ColumnType::Date, Value::Date(d)) => Value::Date(*d),
            (ColumnType::Date, Value::Text(s)) => match parse_date(s, date_formats) {
                Some(d) => Value::Date(d),
                None if col.required => return Coerced::InvalidDate,
                None => Value::Missing,
            },
            (ColumnType::Date, Value::Number(_)) if col.required => return Coerced::InvalidDate,
            (ColumnType::Date, Value::Number(_)) => Value::Missing,
            (ColumnType::Categorical, Value::Text(s)) => Value::text(s.trim()),
            (ColumnType::Categorical, other) => Value::text(other.to_string()),
        };
        row.push(coerced);
    }

    Coerced::Row(row)
}

/// SHA-256 over the canonical typed row; equal rows share a fingerprint
fn fingerprint(row: &Record) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for value in row {
        match value {
            Value::Missing => hasher.update([0u8]),
            Value::Number(n) => {
                // -0.0 == 0.0
                let n = if *n == 0.0 { 0.0 } else { *n };
                hasher.update([1u8]);
                hasher.update(n.to_be_bytes());
            }
            Value::Text(s) => {
                hasher.update([2u8]);
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
            Value::Date(d) => {
                hasher.update([3u8]);
                hasher.update(d.num_days_from_ce().to_be_bytes());
            }
        }
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::text(s)
    }

    fn sales_raw(rows: Vec<[&str; 4]>) -> Table {
        let schema = Schema::new(vec![
            Column::date("Order Date").required(),
            Column::numeric("Sales").required(),
            Column::numeric("Profit").required(),
            Column::categorical("State"),
        ])
        .unwrap();
        let rows = rows
            .into_iter()
            .map(|r| r.iter().map(|s| text(s)).collect())
            .collect();
        Table::new(schema, rows).unwrap()
    }

    fn margin_options() -> CleanOptions {
        CleanOptions {
            ratios: vec![RatioSpec::new("Profit Margin", "Profit", "Sales")],
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_coerces_and_derives() {
        let raw = sales_raw(vec![["11/08/2016", "$1,000.00", "250", " Kentucky "]]);
        let outcome = clean(&raw, &margin_options()).unwrap();
        let table = outcome.table().unwrap();

        let names: Vec<&str> = table.schema().names().collect();
        assert_eq!(
            names,
            vec![
                "Order Date",
                "Sales",
                "Profit",
                "State",
                "Profit Margin",
                "Year",
                "Month",
                "Quarter"
            ]
        );

        let row = &table.rows()[0];
        assert_eq!(row[0], Value::Date(NaiveDate::from_ymd_opt(2016, 11, 8).unwrap()));
        assert_eq!(row[1], Value::Number(1000.0));
        assert_eq!(row[3], Value::Text("Kentucky".to_string()));
        assert_eq!(row[4], Value::Number(0.25));
        assert_eq!(row[5], Value::Number(2016.0));
        assert_eq!(row[6], Value::Number(11.0));
        assert_eq!(row[7], Value::Number(4.0));
    }

    #[test]
    fn test_zero_denominator_ratio_is_missing() {
        let raw = sales_raw(vec![["01/02/2023", "0", "-5", "Ohio"]]);
        let table = clean(&raw, &margin_options()).unwrap().into_table().unwrap();
        assert!(table.value(0, "Profit Margin").unwrap().is_missing());
    }

    #[test]
    fn test_ratio_skipped_when_sources_absent() {
        let raw = sales_raw(vec![["01/02/2023", "10", "5", "Ohio"]]);
        let options = CleanOptions {
            ratios: vec![RatioSpec::new("Discount Rate", "Discount", "Sales")],
            ..Default::default()
        };
        let table = clean(&raw, &options).unwrap().into_table().unwrap();
        assert!(!table.schema().contains("Discount Rate"));
    }

    #[test]
    fn test_ratio_over_categorical_is_config_error() {
        let raw = sales_raw(vec![["01/02/2023", "10", "5", "Ohio"]]);
        let options = CleanOptions {
            ratios: vec![RatioSpec::new("Odd", "Sales", "State")],
            ..Default::default()
        };
        assert!(matches!(
            clean(&raw, &options),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_drops_bad_dates_and_missing_required() {
        let raw = sales_raw(vec![
            ["not a date", "10", "1", "Ohio"],
            ["01/02/2023", " ", "1", "Ohio"],
            ["01/02/2023", "abc", "1", "Ohio"],
            ["01/02/2023", "10", "1", ""],
        ]);
        let outcome = clean(&raw, &CleanOptions::default()).unwrap();
        let report = outcome.report();

        assert_eq!(report.input_rows, 4);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.missing_required, 2);
        assert_eq!(report.output_rows, 1);

        // Optional categorical stays missing rather than dropping the row
        let table = outcome.table().unwrap();
        assert!(table.value(0, "State").unwrap().is_missing());
    }

    #[test]
    fn test_removes_exact_duplicates() {
        let raw = sales_raw(vec![
            ["01/02/2023", "10", "1", "Ohio"],
            // Same values after coercion
            ["2023-01-02", "$10.00", "1", "Ohio "],
            ["01/02/2023", "10", "2", "Ohio"],
        ]);
        let outcome = clean(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(outcome.report().duplicates_removed, 1);
        assert_eq!(outcome.table().unwrap().len(), 2);
    }

    #[test]
    fn test_negative_zero_rows_are_duplicates() {
        let raw = sales_raw(vec![
            ["01/02/2023", "10", "0", "Ohio"],
            ["01/02/2023", "10", "-0", "Ohio"],
            ["01/02/2023", "10", "(0)", "Ohio"],
        ]);
        let outcome = clean(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(outcome.report().duplicates_removed, 2);
        assert_eq!(outcome.report().output_rows, 1);
    }

    #[test]
    fn test_empty_outcome() {
        let raw = sales_raw(vec![["garbage", "10", "1", "Ohio"]]);
        let outcome = clean(&raw, &margin_options()).unwrap();
        assert!(outcome.is_empty());
        // Derived columns are still part of the reported schema
        assert!(outcome.schema().contains("Profit Margin"));
        assert!(matches!(outcome.into_table(), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_input_is_not_modified() {
        let raw = sales_raw(vec![["01/02/2023", "10", "1", "Ohio"]]);
        let before = raw.clone();
        let _ = clean(&raw, &margin_options()).unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn test_prefixed_calendar_columns_for_multiple_dates() {
        let schema = Schema::new(vec![
            Column::date("Order Date"),
            Column::date("Ship Date"),
        ])
        .unwrap();
        let raw = Table::new(
            schema,
            vec![vec![text("2023-01-02"), text("2023-04-05")]],
        )
        .unwrap();
        let table = clean(&raw, &CleanOptions::default())
            .unwrap()
            .into_table()
            .unwrap();

        assert_eq!(table.value(0, "Ship Date Quarter"), Some(&Value::Number(2.0)));
        assert_eq!(table.value(0, "Order Date Month"), Some(&Value::Number(1.0)));
        assert!(!table.schema().contains("Year"));
    }
}
