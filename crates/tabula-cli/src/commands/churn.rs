//! Churn report command

use std::path::Path;

use anyhow::{Context, Result};
use tabula_core::{ChurnAnalysis, EvaluationReport, ModelReport};

use super::sales::print_clean_report;
use super::{fmt_opt, load_config, open_csv, print_json, print_summary, Output};

/// Command-line overrides of the configured model settings
#[derive(Debug, Clone, Copy, Default)]
pub struct ChurnOverrides {
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
    pub threshold: Option<f64>,
}

pub fn cmd_churn(
    config_path: Option<&Path>,
    file: &Path,
    overrides: ChurnOverrides,
    output: Output,
) -> Result<()> {
    let mut churn = load_config(config_path)?.churn;
    if let Some(fraction) = overrides.test_fraction {
        churn.test_fraction = fraction;
    }
    if let Some(seed) = overrides.seed {
        churn.seed = seed;
    }
    if let Some(threshold) = overrides.threshold {
        churn.threshold = threshold;
    }
    churn.validate()?;

    let analysis = ChurnAnalysis::from_reader(open_csv(file)?, &churn)
        .with_context(|| format!("Failed to analyse {}", file.display()))?;

    if output == Output::Json {
        return print_json(&analysis);
    }

    println!();
    println!("📉 Churn Report: {}", file.display());
    print_clean_report(&analysis.clean);

    let Some(model) = &analysis.model else {
        println!();
        println!("   No rows left after cleaning; nothing to analyse.");
        return Ok(());
    };

    println!();
    println!(
        "   Overall churn rate: {}%",
        fmt_opt(analysis.churn_rate.map(|r| r * 100.0), 1)
    );
    for rates in &analysis.rates {
        print_summary(rates);
    }
    if let Some(profile) = &analysis.profile {
        print_summary(profile);
    }

    print_training(model);
    print_evaluation(&model.evaluation);
    println!();

    Ok(())
}

fn print_training(model: &ModelReport) {
    println!();
    println!("🧮 Logistic Regression");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Rows encoded:   {} ({} excluded, {} churned)",
        model.encoded_rows, model.excluded_rows, model.positives
    );
    println!(
        "   Train / test:   {} / {}",
        model.train_rows, model.test_rows
    );
    println!(
        "   Iterations:     {}{}",
        model.fit.iterations,
        if model.fit.converged {
            ""
        } else {
            " (not converged)"
        }
    );
    println!("   Final loss:     {:.4}", model.fit.final_loss);

    println!();
    println!("   Strongest features:");
    for feature in model.strongest_features(5) {
        println!("     {:32} {:>+9.4}", feature.feature, feature.weight);
    }
}

fn print_evaluation(report: &EvaluationReport) {
    let cm = &report.confusion_matrix;

    println!();
    println!("✅ Evaluation (threshold {:.2})", report.threshold);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Accuracy: {:.4}", report.accuracy);
    println!();
    println!(
        "   {:14} │ {:>9} │ {:>9} │ {:>9} │ {:>7}",
        "", "precision", "recall", "f1", "support"
    );
    println!("   ───────────────┼───────────┼───────────┼───────────┼─────────");
    let classes = &report.classes;
    for (label, m) in [
        ("No churn", &classes.negative),
        ("Churn", &classes.positive),
        ("macro avg", &classes.macro_avg),
        ("weighted avg", &classes.weighted_avg),
    ] {
        println!(
            "   {:14} │ {:>9.2} │ {:>9.2} │ {:>9.2} │ {:>7}",
            label, m.precision, m.recall, m.f1, m.support
        );
    }

    println!();
    println!("   Confusion matrix (actual × predicted):");
    println!("     {:>10} {:>10} {:>10}", "", "no churn", "churn");
    println!(
        "     {:>10} {:>10} {:>10}",
        "no churn", cm.true_negatives, cm.false_positives
    );
    println!(
        "     {:>10} {:>10} {:>10}",
        "churn", cm.false_negatives, cm.true_positives
    );
}
