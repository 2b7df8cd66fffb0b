//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;
use std::path::Path;

use tabula_core::test_utils::{churn_csv, SALES_CSV};
use tempfile::NamedTempFile;

use crate::commands::{self, fmt_opt, truncate, ChurnOverrides, Output};

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Built-in config written to a temp file, so tests never read a user override
fn embedded_config() -> NamedTempFile {
    write_temp(tabula_core::config::default_config_toml())
}

// ========== Sales Command Tests ==========

#[test]
fn test_cmd_sales_text_and_json() {
    let csv = write_temp(SALES_CSV);
    let config = embedded_config();

    for output in [Output::Text, Output::Json] {
        let result = commands::cmd_sales(Some(config.path()), csv.path(), None, output);
        assert!(result.is_ok(), "{:?}", result.err());
    }
}

#[test]
fn test_cmd_sales_with_top_n() {
    let csv = write_temp(SALES_CSV);
    let config = embedded_config();
    assert!(commands::cmd_sales(Some(config.path()), csv.path(), Some(1), Output::Text).is_ok());
    assert!(commands::cmd_sales(Some(config.path()), csv.path(), Some(0), Output::Text).is_err());
}

#[test]
fn test_cmd_sales_missing_file() {
    let config = embedded_config();
    let result = commands::cmd_sales(
        Some(config.path()),
        Path::new("/nonexistent/orders.csv"),
        None,
        Output::Text,
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_sales_wrong_layout() {
    let csv = write_temp(&churn_csv(10));
    let config = embedded_config();
    let result = commands::cmd_sales(Some(config.path()), csv.path(), None, Output::Text);
    assert!(result.is_err());
}

// ========== Churn Command Tests ==========

#[test]
fn test_cmd_churn_with_overrides() {
    let csv = write_temp(&churn_csv(120));
    let config = embedded_config();
    let overrides = ChurnOverrides {
        test_fraction: Some(0.25),
        seed: Some(7),
        threshold: Some(0.4),
    };

    for output in [Output::Text, Output::Json] {
        let result = commands::cmd_churn(Some(config.path()), csv.path(), overrides, output);
        assert!(result.is_ok(), "{:?}", result.err());
    }
}

#[test]
fn test_cmd_churn_rejects_bad_overrides() {
    let csv = write_temp(&churn_csv(60));
    let config = embedded_config();

    for overrides in [
        ChurnOverrides {
            test_fraction: Some(1.0),
            ..Default::default()
        },
        ChurnOverrides {
            threshold: Some(1.5),
            ..Default::default()
        },
    ] {
        let result = commands::cmd_churn(Some(config.path()), csv.path(), overrides, Output::Text);
        assert!(result.is_err());
    }
}

// ========== Inspect Command Tests ==========

#[test]
fn test_cmd_inspect_detects_layout() {
    let config = embedded_config();
    let sales = write_temp(SALES_CSV);
    let churn = write_temp(&churn_csv(20));

    assert!(commands::cmd_inspect(Some(config.path()), sales.path(), None, Output::Text).is_ok());
    assert!(commands::cmd_inspect(Some(config.path()), churn.path(), None, Output::Json).is_ok());
}

#[test]
fn test_cmd_inspect_explicit_and_unknown_dataset() {
    let config = embedded_config();
    let sales = write_temp(SALES_CSV);
    assert!(
        commands::cmd_inspect(Some(config.path()), sales.path(), Some("sales"), Output::Text)
            .is_ok()
    );
    assert!(
        commands::cmd_inspect(Some(config.path()), sales.path(), Some("ledger"), Output::Text)
            .is_err()
    );

    let unknown = write_temp("a,b,c\n1,2,3\n");
    assert!(commands::cmd_inspect(Some(config.path()), unknown.path(), None, Output::Text).is_err());
}

// ========== Config Command Tests ==========

#[test]
fn test_cmd_config() {
    let config = embedded_config();
    assert!(commands::cmd_config(Some(config.path()), false).is_ok());
    assert!(commands::cmd_config(None, true).is_ok());
}

#[test]
fn test_cmd_config_invalid_file() {
    let config = write_temp("[sales]\nunknown_key = 1\n");
    assert!(commands::cmd_config(Some(config.path()), false).is_err());
    assert!(commands::cmd_config(Some(Path::new("/nonexistent/analysis.toml")), false).is_err());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("Phones", 10), "Phones");
    assert_eq!(truncate("Office Supplies / Binders", 10), "Office ...");
}

#[test]
fn test_fmt_opt() {
    assert_eq!(fmt_opt(Some(12.346), 2), "12.35");
    assert_eq!(fmt_opt(None, 2), "-");
}
