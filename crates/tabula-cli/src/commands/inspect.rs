//! Layout detection and cleaning report

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tabula_core::{clean, detect_dataset, parse_csv, CleanReport, Column, Dataset};

use super::sales::print_clean_report;
use super::{load_config, open_csv, print_json, Output};

#[derive(Debug, Serialize)]
struct Inspection<'a> {
    dataset: Dataset,
    detected: bool,
    columns: &'a [Column],
    clean: CleanReport,
}

pub fn cmd_inspect(
    config_path: Option<&Path>,
    file: &Path,
    dataset: Option<&str>,
    output: Output,
) -> Result<()> {
    let config = load_config(config_path)?;

    let mut input = open_csv(file)?;
    let (dataset, detected) = match dataset {
        Some(name) => (name.parse::<Dataset>().map_err(anyhow::Error::msg)?, false),
        None => {
            let mut header = String::new();
            BufReader::new(&mut input)
                .read_line(&mut header)
                .with_context(|| format!("Failed to read header of {}", file.display()))?;
            let dataset = detect_dataset(&header).with_context(|| {
                format!(
                    "Could not detect dataset of {}. Use --dataset sales|churn",
                    file.display()
                )
            })?;
            input.seek(SeekFrom::Start(0))?;
            (dataset, true)
        }
    };

    let schema = config.schema(dataset);
    let raw = parse_csv(input, schema)
        .with_context(|| format!("Failed to read {} as {}", file.display(), dataset))?;
    let outcome = clean(&raw, config.clean_options(dataset))?;

    if output == Output::Json {
        return print_json(&Inspection {
            dataset,
            detected,
            columns: outcome.schema().columns(),
            clean: outcome.report().clone(),
        });
    }

    println!();
    println!(
        "🔍 {} ({} dataset{})",
        file.display(),
        dataset,
        if detected { ", detected" } else { "" }
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:28} │ {:12} │ Required", "Column", "Type");
    println!("   ─────────────────────────────┼──────────────┼─────────");
    for column in outcome.schema().columns() {
        println!(
            "   {:28} │ {:12} │ {}",
            column.name,
            column.column_type.as_str(),
            if column.required { "yes" } else { "" }
        );
    }

    println!();
    println!("🧹 Cleaning");
    print_clean_report(outcome.report());
    println!();

    Ok(())
}
