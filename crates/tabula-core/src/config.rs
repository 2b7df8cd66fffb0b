//! Analysis configuration
//!
//! Declares the schema of each dataset family, the groupings and rule
//! bindings of the sales report, and the churn model settings.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/tabula/config/analysis.toml) when it exists
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! A family section missing from an override file is taken from the defaults.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::aggregate::{GroupingRequest, MetricOrder, MetricSource, MetricSpec, Reduction};
use crate::clean::{CleanOptions, RatioSpec};
use crate::error::{Error, Result};
use crate::evaluate::DEFAULT_THRESHOLD;
use crate::features::EncoderConfig;
use crate::insights::{InsightTopic, RuleBindings};
use crate::models::{Column, ColumnType, Dataset, Schema};
use crate::split::{DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use crate::train::TrainerConfig;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/analysis.toml");

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Embedded,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Embedded => write!(f, "embedded defaults"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Sales report settings
#[derive(Debug, Clone, PartialEq)]
pub struct SalesConfig {
    pub schema: Schema,
    pub clean: CleanOptions,
    /// Computed in this order
    pub groupings: Vec<GroupingRequest>,
    pub rules: RuleBindings,
}

impl SalesConfig {
    /// Replace the top-N of every grouping that declares one
    pub fn with_top_n(mut self, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("top-n must be at least 1"));
        }
        for grouping in &mut self.groupings {
            if grouping.top_n.is_some() {
                grouping.top_n = Some(n);
            }
        }
        Ok(self)
    }
}

/// Churn model settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnConfig {
    pub schema: Schema,
    pub clean: CleanOptions,
    pub encoder: EncoderConfig,
    pub trainer: TrainerConfig,
    pub test_fraction: f64,
    pub seed: u64,
    pub threshold: f64,
    /// Categorical columns for churn-rate breakdowns
    pub rate_by: Vec<String>,
    /// Numeric columns profiled (mean, min, max) by churn status
    pub profile: Vec<String>,
}

impl ChurnConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::config(format!(
                "test_fraction must be between 0 and 1 (exclusive), got {}",
                self.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        self.trainer.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub sales: SalesConfig,
    pub churn: ChurnConfig,
    source: ConfigSource,
}

impl AnalysisConfig {
    /// Load from an explicit path, the override file, or the embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Self::embedded(),
            },
        }
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.source = ConfigSource::File(path.to_path_buf());
        debug!(path = %path.display(), "Loaded analysis config");
        Ok(config)
    }

    /// Parse TOML, taking absent sections from the embedded defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;

        let (sales, churn) = match (raw.sales, raw.churn) {
            (Some(sales), Some(churn)) => (sales, churn),
            (sales, churn) => {
                let defaults: RawConfig = toml::from_str(DEFAULT_CONFIG)?;
                let missing = || Error::config("Embedded config is incomplete");
                (
                    sales.or(defaults.sales).ok_or_else(missing)?,
                    churn.or(defaults.churn).ok_or_else(missing)?,
                )
            }
        };

        Ok(Self {
            sales: sales.into_config()?,
            churn: churn.into_config()?,
            source: ConfigSource::Embedded,
        })
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Declared schema of a dataset family
    pub fn schema(&self, dataset: Dataset) -> &Schema {
        match dataset {
            Dataset::Sales => &self.sales.schema,
            Dataset::Churn => &self.churn.schema,
        }
    }

    /// Cleaning options of a dataset family
    pub fn clean_options(&self, dataset: Dataset) -> &CleanOptions {
        match dataset {
            Dataset::Sales => &self.sales.clean,
            Dataset::Churn => &self.churn.clean,
        }
    }
}

/// The embedded default TOML
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tabula").join("config").join("analysis.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    sales: Option<RawSales>,
    churn: Option<RawChurn>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSales {
    columns: Vec<RawColumn>,
    #[serde(default)]
    date_formats: Vec<String>,
    #[serde(default)]
    ratios: Vec<RatioSpec>,
    calendar: Option<bool>,
    #[serde(default)]
    groupings: Vec<RawGrouping>,
    #[serde(default)]
    rules: RuleBindings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGrouping {
    name: String,
    #[serde(default)]
    group_by: Vec<String>,
    metrics: Vec<RawMetric>,
    order_by: Option<String>,
    #[serde(default)]
    descending: bool,
    top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMetric {
    name: String,
    column: Option<String>,
    reduction: String,
    equals: Option<String>,
    numerator: Option<String>,
    denominator: Option<String>,
    scale: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChurn {
    columns: Vec<RawColumn>,
    #[serde(default)]
    date_formats: Vec<String>,
    #[serde(default)]
    ratios: Vec<RatioSpec>,
    calendar: Option<bool>,
    rate_by: Option<Vec<String>>,
    profile: Option<Vec<String>>,
    #[serde(default)]
    model: RawModel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    label_column: Option<String>,
    positive_value: Option<String>,
    exclude: Option<Vec<String>>,
    test_fraction: Option<f64>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    learning_rate: Option<f64>,
    l2: Option<f64>,
    tolerance: Option<f64>,
    threshold: Option<f64>,
}

fn parse_schema(columns: Vec<RawColumn>) -> Result<Schema> {
    let columns = columns
        .into_iter()
        .map(|raw| {
            let column_type: ColumnType = raw.column_type.parse().map_err(Error::config)?;
            let column = Column::new(raw.name, column_type);
            Ok(if raw.required {
                column.required()
            } else {
                column
            })
        })
        .collect::<Result<Vec<Column>>>()?;
    Schema::new(columns)
}

impl RawMetric {
    fn into_spec(self, grouping: &str) -> Result<MetricSpec> {
        let RawMetric {
            name,
            column,
            reduction,
            equals,
            numerator,
            denominator,
            scale,
        } = self;
        let require = |field: Option<String>, label: &str| {
            field.ok_or_else(|| {
                Error::config(format!(
                    "Metric {} in grouping {} needs `{}`",
                    name, grouping, label
                ))
            })
        };

        let source = match reduction.to_lowercase().as_str() {
            "rate" => MetricSource::Rate {
                column: require(column, "column")?,
                equals: require(equals, "equals")?,
            },
            "ratio" => MetricSource::Ratio {
                numerator: require(numerator, "numerator")?,
                denominator: require(denominator, "denominator")?,
                scale: scale.unwrap_or(1.0),
            },
            other => MetricSource::Column {
                reduction: other.parse::<Reduction>()?,
                column: require(column, "column")?,
            },
        };

        Ok(MetricSpec { name, source })
    }
}

impl RawGrouping {
    fn into_request(self) -> Result<GroupingRequest> {
        if self.top_n == Some(0) {
            return Err(Error::config(format!(
                "Grouping {} has top_n = 0",
                self.name
            )));
        }
        let metrics = self
            .metrics
            .into_iter()
            .map(|m| m.into_spec(&self.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupingRequest {
            name: self.name,
            group_by: self.group_by,
            metrics,
            order_by: self.order_by.map(|metric| MetricOrder {
                metric,
                descending: self.descending,
            }),
            top_n: self.top_n,
        })
    }
}

impl RawSales {
    fn into_config(self) -> Result<SalesConfig> {
        let schema = parse_schema(self.columns)?;
        let groupings = self
            .groupings
            .into_iter()
            .map(RawGrouping::into_request)
            .collect::<Result<Vec<_>>>()?;

        let mut names = HashSet::new();
        for grouping in &groupings {
            if !names.insert(grouping.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate grouping name: {}",
                    grouping.name
                )));
            }
        }

        for topic in [
            InsightTopic::PeakPeriod,
            InsightTopic::LossMakers,
            InsightTopic::TopEntity,
        ] {
            if let Some(binding) = self.rules.get(topic) {
                if !names.contains(binding.grouping.as_str()) {
                    warn!(
                        rule = topic.as_str(),
                        grouping = %binding.grouping,
                        "Rule bound to a grouping that is not configured; it will be skipped"
                    );
                }
            }
        }

        Ok(SalesConfig {
            schema,
            clean: CleanOptions {
                date_formats: self.date_formats,
                ratios: self.ratios,
                calendar: self.calendar.unwrap_or(true),
            },
            groupings,
            rules: self.rules,
        })
    }
}

impl RawChurn {
    fn into_config(self) -> Result<ChurnConfig> {
        let defaults = TrainerConfig::default();
        let model = self.model;

        let config = ChurnConfig {
            schema: parse_schema(self.columns)?,
            clean: CleanOptions {
                date_formats: self.date_formats,
                ratios: self.ratios,
                calendar: self.calendar.unwrap_or(true),
            },
            encoder: EncoderConfig {
                label_column: model.label_column.unwrap_or_else(|| "Churn".to_string()),
                positive_value: model.positive_value.unwrap_or_else(|| "Yes".to_string()),
                exclude: model
                    .exclude
                    .unwrap_or_else(|| vec!["customerID".to_string()]),
            },
            trainer: TrainerConfig {
                max_iterations: model.max_iterations.unwrap_or(defaults.max_iterations),
                learning_rate: model.learning_rate.unwrap_or(defaults.learning_rate),
                l2: model.l2.unwrap_or(defaults.l2),
                tolerance: model.tolerance.unwrap_or(defaults.tolerance),
            },
            test_fraction: model.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION),
            seed: model.seed.unwrap_or(DEFAULT_SEED),
            threshold: model.threshold.unwrap_or(DEFAULT_THRESHOLD),
            rate_by: self
                .rate_by
                .unwrap_or_else(|| vec!["Contract".to_string()]),
            profile: self.profile.unwrap_or_else(|| {
                vec!["tenure".to_string(), "MonthlyCharges".to_string()]
            }),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_parses() {
        let config = AnalysisConfig::embedded().unwrap();
        assert_eq!(config.source(), &ConfigSource::Embedded);

        let sales = &config.sales;
        assert!(sales.schema.contains("Order Date"));
        assert_eq!(sales.clean.ratios[0].name, "Profit Margin");
        assert!(sales
            .groupings
            .iter()
            .any(|g| g.name == "top_states" && g.top_n == Some(15)));
        assert!(sales.rules.peak_period.is_some());
        assert!(sales.rules.loss_makers.is_some());
        assert!(sales.rules.top_entity.is_some());

        let churn = &config.churn;
        assert_eq!(churn.encoder.label_column, "Churn");
        assert_eq!(churn.encoder.exclude, vec!["customerID"]);
        assert_eq!(churn.test_fraction, 0.2);
        assert_eq!(churn.seed, 42);
        assert_eq!(churn.trainer, TrainerConfig::default());
        assert_eq!(churn.rate_by, vec!["Contract"]);
        assert_eq!(churn.profile, vec!["tenure", "MonthlyCharges"]);
    }

    #[test]
    fn test_rule_bindings_point_at_configured_groupings() {
        let config = AnalysisConfig::embedded().unwrap();
        let names: Vec<&str> = config
            .sales
            .groupings
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        for binding in [
            &config.sales.rules.peak_period,
            &config.sales.rules.loss_makers,
            &config.sales.rules.top_entity,
        ]
        .into_iter()
        .flatten()
        {
            assert!(names.contains(&binding.grouping.as_str()));
        }
    }

    #[test]
    fn test_partial_override_keeps_default_sections() {
        let content = r#"
            [churn]
            rate_by = ["Contract", "PaymentMethod"]

            [[churn.columns]]
            name = "customerID"
            type = "categorical"

            [[churn.columns]]
            name = "Churn"
            type = "categorical"
            required = true

            [churn.model]
            seed = 7
            threshold = 0.4
        "#;
        let config = AnalysisConfig::from_toml(content).unwrap();

        assert_eq!(config.churn.seed, 7);
        assert_eq!(config.churn.threshold, 0.4);
        assert_eq!(config.churn.test_fraction, DEFAULT_TEST_FRACTION);
        assert_eq!(config.churn.schema.len(), 2);
        assert_eq!(config.churn.rate_by.len(), 2);
        // Sales comes from the embedded defaults
        assert!(!config.sales.groupings.is_empty());
    }

    #[test]
    fn test_metric_parsing() {
        let content = r#"
            [[sales.columns]]
            name = "Sales"
            type = "numeric"

            [[sales.groupings]]
            name = "totals"
            metrics = [
                { name = "Sales", column = "Sales", reduction = "sum" },
                { name = "Lines", column = "Sales", reduction = "count" },
                { name = "Avg", reduction = "ratio", numerator = "Sales", denominator = "Lines" },
            ]
        "#;
        let config = AnalysisConfig::from_toml(content).unwrap();
        let grouping = &config.sales.groupings[0];

        assert!(grouping.group_by.is_empty());
        assert_eq!(grouping.metrics[0], MetricSpec::sum("Sales", "Sales"));
        assert_eq!(grouping.metrics[2], MetricSpec::ratio("Avg", "Sales", "Lines", 1.0));
    }

    #[test]
    fn test_invalid_configs() {
        let unknown_reduction = r#"
            [[sales.columns]]
            name = "Sales"
            type = "numeric"

            [[sales.groupings]]
            name = "bad"
            metrics = [{ name = "x", column = "Sales", reduction = "median" }]
        "#;
        assert!(matches!(
            AnalysisConfig::from_toml(unknown_reduction),
            Err(Error::InvalidConfiguration(_))
        ));

        let unknown_type = r#"
            [[sales.columns]]
            name = "Sales"
            type = "currency"
        "#;
        assert!(matches!(
            AnalysisConfig::from_toml(unknown_type),
            Err(Error::InvalidConfiguration(_))
        ));

        let bad_fraction = r#"
            [[churn.columns]]
            name = "Churn"
            type = "categorical"

            [churn.model]
            test_fraction = 1.5
        "#;
        assert!(matches!(
            AnalysisConfig::from_toml(bad_fraction),
            Err(Error::InvalidConfiguration(_))
        ));

        let ratio_without_denominator = r#"
            [[sales.columns]]
            name = "Sales"
            type = "numeric"

            [[sales.groupings]]
            name = "bad"
            metrics = [{ name = "r", reduction = "ratio", numerator = "Sales" }]
        "#;
        assert!(matches!(
            AnalysisConfig::from_toml(ratio_without_denominator),
            Err(Error::InvalidConfiguration(_))
        ));

        assert!(matches!(
            AnalysisConfig::from_toml("[sales"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_with_top_n() {
        let sales = AnalysisConfig::embedded().unwrap().sales.with_top_n(5).unwrap();
        let top_states = sales
            .groupings
            .iter()
            .find(|g| g.name == "top_states")
            .unwrap();
        assert_eq!(top_states.top_n, Some(5));
        // Groupings without a top-N are untouched
        assert!(sales
            .groupings
            .iter()
            .filter(|g| g.name != "top_states")
            .all(|g| g.top_n.is_none()));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(&path, default_config_toml()).unwrap();

        let config = AnalysisConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.source(), &ConfigSource::File(path.clone()));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            AnalysisConfig::load(Some(missing.as_path())),
            Err(Error::Io(_))
        ));
    }
}
