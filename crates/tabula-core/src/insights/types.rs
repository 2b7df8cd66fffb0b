//! Core types for the insight rules

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::GroupKey;

/// Topics covered by the built-in rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightTopic {
    /// Period with the highest value of a time-based metric
    PeakPeriod,
    /// Groups with negative profitability
    LossMakers,
    /// Single strongest group by volume
    TopEntity,
}

impl InsightTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightTopic::PeakPeriod => "peak_period",
            InsightTopic::LossMakers => "loss_makers",
            InsightTopic::TopEntity => "top_entity",
        }
    }

    /// Heading used in text reports
    pub fn title(&self) -> &'static str {
        match self {
            InsightTopic::PeakPeriod => "Sales Trends",
            InsightTopic::LossMakers => "Profitability",
            InsightTopic::TopEntity => "Geographic Performance",
        }
    }
}

impl fmt::Display for InsightTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InsightTopic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peak_period" => Ok(InsightTopic::PeakPeriod),
            "loss_makers" => Ok(InsightTopic::LossMakers),
            "top_entity" => Ok(InsightTopic::TopEntity),
            _ => Err(format!("Unknown insight topic: {}", s)),
        }
    }
}

/// One summary row that contributed to an insight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub group: GroupKey,
    pub value: f64,
}

/// A rule finding over one summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub topic: InsightTopic,
    /// What was observed
    pub statement: String,
    /// Suggested action
    pub recommendation: String,
    /// The value that triggered the rule
    pub supporting_value: f64,
    /// Summary the rule read
    pub grouping: String,
    pub metric: String,
    pub evidence: Vec<Evidence>,
}

/// Points a rule at a grouping and one of its metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBinding {
    pub grouping: String,
    pub metric: String,
}

impl RuleBinding {
    pub fn new(grouping: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            grouping: grouping.into(),
            metric: metric.into(),
        }
    }
}

/// Binding per rule; an absent binding disables the rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBindings {
    #[serde(default)]
    pub peak_period: Option<RuleBinding>,
    #[serde(default)]
    pub loss_makers: Option<RuleBinding>,
    #[serde(default)]
    pub top_entity: Option<RuleBinding>,
}

impl RuleBindings {
    pub fn get(&self, topic: InsightTopic) -> Option<&RuleBinding> {
        match topic {
            InsightTopic::PeakPeriod => self.peak_period.as_ref(),
            InsightTopic::LossMakers => self.loss_makers.as_ref(),
            InsightTopic::TopEntity => self.top_entity.as_ref(),
        }
    }
}
