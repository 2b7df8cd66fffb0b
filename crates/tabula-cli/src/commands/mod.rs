//! CLI command implementations
//!
//! Commands are organized by dataset:
//! - `sales` - Sales report (headline metrics, summaries, insights)
//! - `churn` - Churn report (rates, training summary, evaluation)
//! - `inspect` - Layout detection and cleaning report
//! - `config` - Effective configuration

pub mod churn;
pub mod config;
pub mod inspect;
pub mod sales;

// Re-export command functions for main.rs
pub use churn::*;
pub use config::*;
pub use inspect::*;
pub use sales::*;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tabula_core::AnalysisConfig;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Load the analysis config, with a readable error
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load analysis config".to_string(),
    })?;
    tracing::debug!(source = %config.source(), "Using analysis config");
    Ok(config)
}

/// Open an input CSV
pub fn open_csv(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Print any serializable result as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format an optional value, dashes when missing
pub fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a summary table with one column per metric
pub fn print_summary(summary: &tabula_core::SummaryTable) {
    println!();
    println!("   {} ({} groups)", summary.name, summary.len());
    println!("   ─────────────────────────────────────────────────────────────");

    if summary.is_empty() {
        println!("   No groups.");
        return;
    }

    let header: Vec<String> = summary
        .metrics
        .iter()
        .map(|m| format!("{:>14}", truncate(m, 14)))
        .collect();
    println!("   {:28} │{}", truncate(&summary.group_by.join(" / "), 28), header.join(" │"));

    for row in &summary.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .map(|v| format!("{:>14}", fmt_opt(*v, 2)))
            .collect();
        println!(
            "   {:28} │{}",
            truncate(&row.key.to_string(), 28),
            values.join(" │")
        );
    }
}
