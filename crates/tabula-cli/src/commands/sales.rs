//! Sales report command

use std::path::Path;

use anyhow::{Context, Result};
use tabula_core::{CleanReport, KeyMetrics, SalesAnalysis};

use super::{fmt_opt, load_config, open_csv, print_json, print_summary, Output};

pub fn cmd_sales(
    config_path: Option<&Path>,
    file: &Path,
    top_n: Option<usize>,
    output: Output,
) -> Result<()> {
    let config = load_config(config_path)?;
    let sales = match top_n {
        Some(n) => config.sales.with_top_n(n)?,
        None => config.sales,
    };

    let analysis = SalesAnalysis::from_reader(open_csv(file)?, &sales)
        .with_context(|| format!("Failed to analyse {}", file.display()))?;

    if output == Output::Json {
        return print_json(&analysis);
    }

    println!();
    println!("📈 Sales Report: {}", file.display());
    print_clean_report(&analysis.clean);

    let Some(metrics) = &analysis.key_metrics else {
        println!();
        println!("   No rows left after cleaning; nothing to analyse.");
        return Ok(());
    };
    print_key_metrics(metrics);

    for summary in &analysis.summaries {
        print_summary(summary);
    }

    println!();
    println!("💡 Insights");
    println!("   ─────────────────────────────────────────────────────────────");
    if analysis.insights.is_empty() {
        println!("   No insights fired.");
    }
    for insight in &analysis.insights {
        println!();
        println!("   {}", insight.topic.title());
        println!("   • {}", insight.statement);
        println!("   → {}", insight.recommendation);
    }
    println!();

    Ok(())
}

pub(crate) fn print_clean_report(report: &CleanReport) {
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Rows read:          {}", report.input_rows);
    println!("   Invalid dates:      {}", report.invalid_dates);
    println!("   Missing required:   {}", report.missing_required);
    println!("   Duplicates removed: {}", report.duplicates_removed);
    println!("   Rows analysed:      {}", report.output_rows);
}

fn print_key_metrics(metrics: &KeyMetrics) {
    println!();
    println!("📊 Key Metrics");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Total sales:         ${:.2}", metrics.total_sales);
    println!("   Total profit:        ${:.2}", metrics.total_profit);
    println!("   Orders:              {}", metrics.total_orders);
    println!(
        "   Average order value: ${}",
        fmt_opt(metrics.average_order_value, 2)
    );
    println!(
        "   Profit margin:       {}%",
        fmt_opt(metrics.profit_margin, 2)
    );
    if let Some(customers) = metrics.unique_customers {
        println!("   Customers:           {}", customers);
    }
}
