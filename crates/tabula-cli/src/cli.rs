//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tabula - Insights and churn models from business CSV exports
#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Business record analytics from CSV exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Analysis config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse a sales export: headline metrics, summaries and insights
    Sales {
        /// CSV file to analyse
        #[arg(short, long)]
        file: PathBuf,

        /// Limit ranked summaries (e.g. top states) to N groups
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Analyse a customer export: churn rates and a churn classifier
    Churn {
        /// CSV file to analyse
        #[arg(short, long)]
        file: PathBuf,

        /// Fraction of rows held out for evaluation
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Seed for the train/test shuffle
        #[arg(long)]
        seed: Option<u64>,

        /// Probability at or above which a customer is predicted to churn
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Show the detected layout, declared schema and cleaning report of a CSV
    Inspect {
        /// CSV file to inspect
        #[arg(short, long)]
        file: PathBuf,

        /// Dataset family: sales, churn (auto-detected if not specified)
        #[arg(short, long)]
        dataset: Option<String>,
    },

    /// Show the effective analysis configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}
