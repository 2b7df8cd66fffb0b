//! Tabula CLI - Business record analytics
//!
//! Usage:
//!   tabula sales --file CSV      Sales report with insights
//!   tabula churn --file CSV      Churn breakdown and classifier evaluation
//!   tabula inspect --file CSV    Detected layout and cleaning report
//!   tabula config                Effective configuration

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let output = if cli.json {
        commands::Output::Json
    } else {
        commands::Output::Text
    };

    match cli.command {
        Commands::Sales { file, top_n } => {
            commands::cmd_sales(cli.config.as_deref(), &file, top_n, output)
        }
        Commands::Churn {
            file,
            test_fraction,
            seed,
            threshold,
        } => commands::cmd_churn(
            cli.config.as_deref(),
            &file,
            commands::ChurnOverrides {
                test_fraction,
                seed,
                threshold,
            },
            output,
        ),
        Commands::Inspect { file, dataset } => {
            commands::cmd_inspect(cli.config.as_deref(), &file, dataset.as_deref(), output)
        }
        Commands::Config { default } => commands::cmd_config(cli.config.as_deref(), default),
    }
}
