//! End-to-end analyses over one dataset file
//!
//! [`SalesAnalysis`] runs the cleaner, every configured grouping and the
//! insight rules. [`ChurnAnalysis`] runs the cleaner, churn-rate breakdowns and
//! the encode, split, fit and evaluate pipeline. Both share only the cleaned
//! table between their branches.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{aggregate, GroupingRequest, MetricSpec, SummaryTable};
use crate::clean::{clean, CleanOutcome, CleanReport};
use crate::config::{ChurnConfig, SalesConfig};
use crate::error::Result;
use crate::evaluate::{evaluate, EvaluationReport};
use crate::features::FeatureEncoder;
use crate::import::parse_csv;
use crate::insights::{Insight, InsightEngine};
use crate::models::Table;
use crate::split::split;
use crate::train::{FitSummary, LogisticRegressionTrainer, Model};

/// Headline sales figures over the whole cleaned table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub total_sales: f64,
    pub total_profit: f64,
    /// Distinct order ids, or row count without an order id column
    pub total_orders: usize,
    pub average_order_value: Option<f64>,
    /// Percent; missing when total sales is zero
    pub profit_margin: Option<f64>,
    /// Present only when the table has a customer id column
    pub unique_customers: Option<usize>,
}

impl KeyMetrics {
    pub const SALES: &'static str = "Sales";
    pub const PROFIT: &'static str = "Profit";
    pub const ORDER_ID: &'static str = "Order ID";
    pub const CUSTOMER_ID: &'static str = "Customer ID";

    /// Compute from a cleaned sales table via a single global grouping
    pub fn compute(table: &Table) -> Result<Self> {
        let schema = table.schema();
        let orders = if schema.contains(Self::ORDER_ID) {
            MetricSpec::count_distinct("orders", Self::ORDER_ID)
        } else {
            MetricSpec::count("orders", Self::SALES)
        };

        let mut request = GroupingRequest::new("key_metrics", Vec::<String>::new())
            .metric(MetricSpec::sum("sales", Self::SALES))
            .metric(MetricSpec::sum("profit", Self::PROFIT))
            .metric(orders)
            .metric(MetricSpec::ratio("aov", "sales", "orders", 1.0))
            .metric(MetricSpec::ratio("margin", "profit", "sales", 100.0));
        let with_customers = schema.contains(Self::CUSTOMER_ID);
        if with_customers {
            request = request.metric(MetricSpec::count_distinct("customers", Self::CUSTOMER_ID));
        }

        let summary = aggregate(table, &request)?;
        let values = summary
            .rows
            .first()
            .map(|r| r.values.clone())
            .unwrap_or_default();
        let value = |idx: usize| values.get(idx).copied().flatten();

        Ok(Self {
            total_sales: value(0).unwrap_or(0.0),
            total_profit: value(1).unwrap_or(0.0),
            total_orders: value(2).unwrap_or(0.0) as usize,
            average_order_value: value(3),
            profit_margin: value(4),
            unique_customers: if with_customers {
                value(5).map(|n| n as usize)
            } else {
                None
            },
        })
    }
}

/// Everything the sales report prints
#[derive(Debug, Clone, Serialize)]
pub struct SalesAnalysis {
    pub clean: CleanReport,
    /// None when no rows survived cleaning
    pub key_metrics: Option<KeyMetrics>,
    /// In configuration order
    pub summaries: Vec<SummaryTable>,
    pub insights: Vec<Insight>,
}

impl SalesAnalysis {
    /// Parse, clean and analyse a sales CSV
    pub fn from_reader<R: Read>(reader: R, config: &SalesConfig) -> Result<Self> {
        let raw = parse_csv(reader, &config.schema)?;
        Self::run(&raw, config)
    }

    /// Clean and analyse a raw sales table
    pub fn run(raw: &Table, config: &SalesConfig) -> Result<Self> {
        let (table, report) = match clean(raw, &config.clean)? {
            CleanOutcome::Table { table, report } => (table, report),
            CleanOutcome::Empty { report, .. } => {
                warn!(
                    input_rows = report.input_rows,
                    "No sales rows survived cleaning"
                );
                return Ok(Self {
                    clean: report,
                    key_metrics: None,
                    summaries: vec![],
                    insights: vec![],
                });
            }
        };
        let key_metrics = KeyMetrics::compute(&table)?;

        let summaries = config
            .groupings
            .iter()
            .map(|request| aggregate(&table, request))
            .collect::<Result<Vec<_>>>()?;

        let by_name: BTreeMap<String, SummaryTable> = summaries
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect();
        let insights = InsightEngine::new().evaluate(&by_name, &config.rules)?;

        info!(
            rows = table.len(),
            groupings = summaries.len(),
            insights = insights.len(),
            "Sales analysis complete"
        );

        Ok(Self {
            clean: report,
            key_metrics: Some(key_metrics),
            summaries,
            insights,
        })
    }

    pub fn summary(&self, name: &str) -> Option<&SummaryTable> {
        self.summaries.iter().find(|s| s.name == name)
    }
}

/// Feature weight for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub weight: f64,
}

/// Training and evaluation results
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub encoded_rows: usize,
    pub excluded_rows: usize,
    pub positives: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<FeatureWeight>,
    pub model: Model,
    pub fit: FitSummary,
    pub evaluation: EvaluationReport,
}

impl ModelReport {
    /// Features ordered by absolute weight, largest first
    pub fn strongest_features(&self, n: usize) -> Vec<&FeatureWeight> {
        let mut features: Vec<&FeatureWeight> = self.features.iter().collect();
        features.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        features.truncate(n);
        features
    }
}

/// Everything the churn report prints
#[derive(Debug, Clone, Serialize)]
pub struct ChurnAnalysis {
    pub clean: CleanReport,
    /// Share of accounts with the positive label
    pub churn_rate: Option<f64>,
    /// One breakdown per configured column
    pub rates: Vec<SummaryTable>,
    /// Profiled columns by churn status; None when nothing is profiled
    pub profile: Option<SummaryTable>,
    /// None when no rows survived cleaning
    pub model: Option<ModelReport>,
}

impl ChurnAnalysis {
    /// Metric name used in churn-rate breakdowns
    pub const RATE: &'static str = "Churn Rate";
    pub const ACCOUNTS: &'static str = "Accounts";

    /// Mean, min and max of each profiled column per label value
    fn profile_request(config: &ChurnConfig) -> GroupingRequest {
        let label = &config.encoder.label_column;
        let mut request = GroupingRequest::new("churn_profile", [label])
            .metric(MetricSpec::count(Self::ACCOUNTS, label));
        for column in &config.profile {
            request = request
                .metric(MetricSpec::mean(format!("{} mean", column), column))
                .metric(MetricSpec::min(format!("{} min", column), column))
                .metric(MetricSpec::max(format!("{} max", column), column));
        }
        request
    }

    /// Parse, clean and analyse a churn CSV
    pub fn from_reader<R: Read>(reader: R, config: &ChurnConfig) -> Result<Self> {
        let raw = parse_csv(reader, &config.schema)?;
        Self::run(&raw, config)
    }

    /// Clean a raw accounts table, break down churn and fit the classifier
    pub fn run(raw: &Table, config: &ChurnConfig) -> Result<Self> {
        config.validate()?;

        let (table, report) = match clean(raw, &config.clean)? {
            CleanOutcome::Table { table, report } => (table, report),
            CleanOutcome::Empty { report, .. } => {
                warn!(
                    input_rows = report.input_rows,
                    "No accounts survived cleaning"
                );
                return Ok(Self {
                    clean: report,
                    churn_rate: None,
                    rates: vec![],
                    profile: None,
                    model: None,
                });
            }
        };

        let label = &config.encoder.label_column;
        let positive = &config.encoder.positive_value;

        let overall = aggregate(
            &table,
            &GroupingRequest::new("churn_rate", Vec::<String>::new())
                .metric(MetricSpec::rate(Self::RATE, label, positive)),
        )?;
        let churn_rate = overall.rows.first().and_then(|r| r.values[0]);

        let rates = config
            .rate_by
            .iter()
            .map(|column| {
                let request = GroupingRequest::new(format!("churn_by_{}", column), [column])
                    .metric(MetricSpec::rate(Self::RATE, label, positive))
                    .metric(MetricSpec::count(Self::ACCOUNTS, label));
                aggregate(&table, &request)
            })
            .collect::<Result<Vec<_>>>()?;

        let profile = if config.profile.is_empty() {
            None
        } else {
            Some(aggregate(&table, &Self::profile_request(config))?)
        };

        let model = train_and_evaluate(&table, config)?;

        Ok(Self {
            clean: report,
            churn_rate,
            rates,
            profile,
            model: Some(model),
        })
    }
}

fn train_and_evaluate(table: &Table, config: &ChurnConfig) -> Result<ModelReport> {
    let encoded = FeatureEncoder::new(config.encoder.clone()).encode(table)?;
    let parts = split(
        &encoded.matrix,
        &encoded.labels,
        config.test_fraction,
        config.seed,
    )?;
    let data = parts.apply(&encoded.matrix, &encoded.labels);

    let fitted = LogisticRegressionTrainer::new(config.trainer.clone())
        .fit(&data.train_matrix, &data.train_labels)?;
    let evaluation = evaluate(
        &fitted.model,
        &data.test_matrix,
        &data.test_labels,
        config.threshold,
    )?;

    info!(
        train = parts.train.len(),
        test = parts.test.len(),
        accuracy = evaluation.accuracy,
        "Churn model evaluated"
    );

    let features = encoded
        .layout
        .feature_names()
        .iter()
        .zip(&fitted.model.weights)
        .map(|(name, &weight)| FeatureWeight {
            feature: name.clone(),
            weight,
        })
        .collect();

    Ok(ModelReport {
        encoded_rows: encoded.matrix.nrows(),
        excluded_rows: encoded.excluded_rows.len(),
        positives: encoded.positives(),
        train_rows: parts.train.len(),
        test_rows: parts.test.len(),
        features,
        model: fitted.model,
        fit: fitted.summary,
        evaluation,
    })
}
