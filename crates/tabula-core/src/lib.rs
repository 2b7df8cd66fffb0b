//! Tabula Core Library
//!
//! Shared functionality for the Tabula analytics tool:
//! - CSV import against declared schemas
//! - Table cleaning with derived ratio and calendar columns
//! - Grouped aggregation with configurable metrics
//! - Pluggable insight rules over aggregated summaries
//! - Feature encoding, seeded splitting and logistic regression for churn
//! - Layered analysis configuration (embedded default, user override)

pub mod aggregate;
pub mod analysis;
pub mod clean;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod import;
pub mod insights;
pub mod models;
pub mod split;
pub mod train;

/// Test utilities including fixture tables and CSV exports
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{
    aggregate, aggregate_all, GroupKey, GroupValue, GroupingRequest, MetricSpec, Reduction,
    SummaryTable,
};
pub use analysis::{ChurnAnalysis, FeatureWeight, KeyMetrics, ModelReport, SalesAnalysis};
pub use clean::{clean, CleanOptions, CleanOutcome, CleanReport, RatioSpec};
pub use config::{AnalysisConfig, ChurnConfig, ConfigSource, SalesConfig};
pub use error::{Error, Result};
pub use evaluate::{evaluate, ConfusionMatrix, EvaluationReport};
pub use features::{EncoderConfig, FeatureEncoder, FeatureLayout, FeatureMatrix};
pub use import::{detect_dataset, parse_csv};
pub use insights::{Insight, InsightEngine, InsightTopic, Rule, RuleBindings};
pub use models::{Column, ColumnType, Dataset, Schema, Table, Value};
pub use split::{split, Split};
pub use train::{FittedModel, LogisticRegressionTrainer, Model, TrainerConfig};
