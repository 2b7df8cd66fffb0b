//! Grouped aggregation over cleaned tables
//!
//! A [`GroupingRequest`] names the group-by columns and the metrics to compute
//! per group. Groups only exist for key combinations that occur in the data,
//! and output order is fully determined by the group keys (or by an explicit
//! metric ordering), so the same table and request always produce the same
//! [`SummaryTable`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ColumnType, Table, Value};

/// Reductions over a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    /// Non-missing values
    Count,
    CountDistinct,
    Mean,
    Max,
    Min,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Count => "count",
            Reduction::CountDistinct => "count_distinct",
            Reduction::Mean => "mean",
            Reduction::Max => "max",
            Reduction::Min => "min",
        }
    }

    /// Whether the source column must be numeric
    pub fn needs_numeric(&self) -> bool {
        matches!(
            self,
            Reduction::Sum | Reduction::Mean | Reduction::Max | Reduction::Min
        )
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Reduction::Sum),
            "count" => Ok(Reduction::Count),
            "count_distinct" | "nunique" => Ok(Reduction::CountDistinct),
            "mean" | "avg" => Ok(Reduction::Mean),
            "max" => Ok(Reduction::Max),
            "min" => Ok(Reduction::Min),
            _ => Err(Error::config(format!("Unknown reduction: {}", s))),
        }
    }
}

/// Where a metric's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSource {
    /// A reduction over one column
    Column { column: String, reduction: Reduction },
    /// Share of non-missing values in `column` equal to `equals`
    Rate { column: String, equals: String },
    /// `numerator / denominator * scale` over two earlier metrics
    Ratio {
        numerator: String,
        denominator: String,
        scale: f64,
    },
}

/// A named output metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub source: MetricSource,
}

impl MetricSpec {
    pub fn column(name: impl Into<String>, column: impl Into<String>, reduction: Reduction) -> Self {
        Self {
            name: name.into(),
            source: MetricSource::Column {
                column: column.into(),
                reduction,
            },
        }
    }

    pub fn sum(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::Sum)
    }

    pub fn count(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::Count)
    }

    pub fn count_distinct(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::CountDistinct)
    }

    pub fn mean(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::Mean)
    }

    pub fn max(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::Max)
    }

    pub fn min(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::column(name, column, Reduction::Min)
    }

    pub fn rate(
        name: impl Into<String>,
        column: impl Into<String>,
        equals: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: MetricSource::Rate {
                column: column.into(),
                equals: equals.into(),
            },
        }
    }

    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        scale: f64,
    ) -> Self {
        Self {
            name: name.into(),
            source: MetricSource::Ratio {
                numerator: numerator.into(),
                denominator: denominator.into(),
                scale,
            },
        }
    }
}

/// Explicit output ordering by a metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricOrder {
    pub metric: String,
    pub descending: bool,
}

/// One grouping to compute
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingRequest {
    pub name: String,
    pub group_by: Vec<String>,
    pub metrics: Vec<MetricSpec>,
    pub order_by: Option<MetricOrder>,
    pub top_n: Option<usize>,
}

impl GroupingRequest {
    pub fn new<S: Into<String>>(name: impl Into<String>, group_by: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            group_by: group_by.into_iter().map(Into::into).collect(),
            metrics: vec![],
            order_by: None,
            top_n: None,
        }
    }

    pub fn metric(mut self, metric: MetricSpec) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn order_by(mut self, metric: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(MetricOrder {
            metric: metric.into(),
            descending,
        });
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }
}

/// One component of a group key
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GroupValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl GroupValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Missing => None,
            Value::Number(n) => Some(GroupValue::Number(*n)),
            Value::Date(d) => Some(GroupValue::Date(*d)),
            Value::Text(s) => Some(GroupValue::Text(s.clone())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            GroupValue::Number(_) => 0,
            GroupValue::Date(_) => 1,
            GroupValue::Text(_) => 2,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GroupValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Ord for GroupValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupValue::Number(a), GroupValue::Number(b)) => a.total_cmp(b),
            (GroupValue::Date(a), GroupValue::Date(b)) => a.cmp(b),
            (GroupValue::Text(a), GroupValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for GroupValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupValue {}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Number(n) => crate::models::format_number(*n, f),
            GroupValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            GroupValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for GroupValue {
    fn from(s: &str) -> Self {
        GroupValue::Text(s.to_string())
    }
}

impl From<f64> for GroupValue {
    fn from(n: f64) -> Self {
        GroupValue::Number(n)
    }
}

/// Tuple of group-by values, ordered component by component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupKey(pub Vec<GroupValue>);

impl GroupKey {
    pub fn parts(&self) -> &[GroupValue] {
        &self.0
    }

    /// "Year=2023, Month=12" style label
    pub fn label(&self, group_by: &[String]) -> String {
        group_by
            .iter()
            .zip(&self.0)
            .map(|(col, value)| format!("{}={}", col, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(all)");
        }
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join(" / "))
    }
}

/// One output group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: GroupKey,
    /// Aligned with [`SummaryTable::metrics`]; `None` is a missing value
    pub values: Vec<Option<f64>>,
}

/// Result of one grouping request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub name: String,
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn metric_index(&self, metric: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m == metric)
    }

    /// Position of a metric the caller depends on
    pub fn require_metric(&self, metric: &str) -> Result<usize> {
        self.metric_index(metric).ok_or_else(|| {
            Error::config(format!(
                "Summary {} has no metric {}",
                self.name, metric
            ))
        })
    }

    /// Value of a metric for a group
    pub fn get(&self, key: &GroupKey, metric: &str) -> Option<f64> {
        let idx = self.metric_index(metric)?;
        self.rows
            .iter()
            .find(|r| &r.key == key)
            .and_then(|r| r.values[idx])
    }

    /// Non-missing values of a metric, in output order
    pub fn values_of(&self, metric: &str) -> Result<Vec<(&GroupKey, f64)>> {
        let idx = self.require_metric(metric)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|r| r.values[idx].map(|v| (&r.key, v)))
            .collect())
    }

    /// Group with the largest value of a metric; ties go to the first in output order
    pub fn arg_max(&self, metric: &str) -> Result<Option<(&GroupKey, f64)>> {
        self.extreme(metric, Ordering::Greater)
    }

    /// Group with the smallest value of a metric; ties go to the first in output order
    pub fn arg_min(&self, metric: &str) -> Result<Option<(&GroupKey, f64)>> {
        self.extreme(metric, Ordering::Less)
    }

    fn extreme(&self, metric: &str, wanted: Ordering) -> Result<Option<(&GroupKey, f64)>> {
        let mut best: Option<(&GroupKey, f64)> = None;
        for (key, value) in self.values_of(metric)? {
            let replace = match best {
                Some((_, current)) => value.total_cmp(&current) == wanted,
                None => true,
            };
            if replace {
                best = Some((key, value));
            }
        }
        Ok(best)
    }
}

enum Accumulator {
    Sum(f64),
    Count(usize),
    Distinct(BTreeSet<GroupValue>),
    Mean { sum: f64, n: usize },
    Max(Option<f64>),
    Min(Option<f64>),
    Rate { hits: usize, n: usize },
}

impl Accumulator {
    fn update(&mut self, value: &Value, equals: Option<&str>) {
        if value.is_missing() {
            return;
        }
        match self {
            Accumulator::Sum(total) => *total += value.as_f64().unwrap_or(0.0),
            Accumulator::Count(n) => *n += 1,
            Accumulator::Distinct(set) => {
                if let Some(v) = GroupValue::from_value(value) {
                    set.insert(v);
                }
            }
            Accumulator::Mean { sum, n } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *n += 1;
                }
            }
            Accumulator::Max(current) => {
                if let Some(v) = value.as_f64() {
                    *current = Some(current.map_or(v, |c| c.max(v)));
                }
            }
            Accumulator::Min(current) => {
                if let Some(v) = value.as_f64() {
                    *current = Some(current.map_or(v, |c| c.min(v)));
                }
            }
            Accumulator::Rate { hits, n } => {
                *n += 1;
                if equals.is_some_and(|e| value.to_string() == e) {
                    *hits += 1;
                }
            }
        }
    }

    fn finish(&self) -> Option<f64> {
        match self {
            Accumulator::Sum(total) => Some(*total),
            Accumulator::Count(n) => Some(*n as f64),
            Accumulator::Distinct(set) => Some(set.len() as f64),
            Accumulator::Mean { sum, n } => (*n > 0).then(|| sum / *n as f64),
            Accumulator::Max(v) | Accumulator::Min(v) => *v,
            Accumulator::Rate { hits, n } => (*n > 0).then(|| *hits as f64 / *n as f64),
        }
    }
}

/// Validated plan for one metric
enum Plan {
    Column {
        idx: usize,
        reduction: Reduction,
    },
    Rate {
        idx: usize,
        equals: String,
    },
    Ratio {
        numerator: usize,
        denominator: usize,
        scale: f64,
    },
}

impl Plan {
    fn accumulator(&self) -> Option<Accumulator> {
        match self {
            Plan::Column { reduction, .. } => Some(match reduction {
                Reduction::Sum => Accumulator::Sum(0.0),
                Reduction::Count => Accumulator::Count(0),
                Reduction::CountDistinct => Accumulator::Distinct(BTreeSet::new()),
                Reduction::Mean => Accumulator::Mean { sum: 0.0, n: 0 },
                Reduction::Max => Accumulator::Max(None),
                Reduction::Min => Accumulator::Min(None),
            }),
            Plan::Rate { .. } => Some(Accumulator::Rate { hits: 0, n: 0 }),
            Plan::Ratio { .. } => None,
        }
    }
}

fn plan_metrics(table: &Table, request: &GroupingRequest) -> Result<Vec<Plan>> {
    let schema = table.schema();
    let mut names: HashSet<&str> = HashSet::new();
    let mut plans = Vec::with_capacity(request.metrics.len());

    for (position, metric) in request.metrics.iter().enumerate() {
        if !names.insert(metric.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate metric {} in grouping {}",
                metric.name, request.name
            )));
        }

        let plan = match &metric.source {
            MetricSource::Column { column, reduction } => {
                let idx = schema.require(column)?;
                let column_type = schema.columns()[idx].column_type;
                if reduction.needs_numeric() && column_type != ColumnType::Numeric {
                    return Err(Error::config(format!(
                        "Metric {} applies {} to {} column {}",
                        metric.name, reduction, column_type, column
                    )));
                }
                Plan::Column {
                    idx,
                    reduction: *reduction,
                }
            }
            MetricSource::Rate { column, equals } => Plan::Rate {
                idx: schema.require(column)?,
                equals: equals.clone(),
            },
            MetricSource::Ratio {
                numerator,
                denominator,
                scale,
            } => {
                // Only metrics declared earlier can be referenced
                let earlier = &request.metrics[..position];
                let find = |name: &str| {
                    earlier.iter().position(|m| m.name == name).ok_or_else(|| {
                        Error::config(format!(
                            "Ratio {} references unknown metric {}",
                            metric.name, name
                        ))
                    })
                };
                Plan::Ratio {
                    numerator: find(numerator.as_str())?,
                    denominator: find(denominator.as_str())?,
                    scale: *scale,
                }
            }
        };
        plans.push(plan);
    }

    if let Some(order) = &request.order_by {
        if !names.contains(order.metric.as_str()) {
            return Err(Error::config(format!(
                "Grouping {} orders by unknown metric {}",
                request.name, order.metric
            )));
        }
    }

    if request.top_n == Some(0) {
        return Err(Error::config(format!(
            "Grouping {} has top_n = 0",
            request.name
        )));
    }

    Ok(plans)
}

/// Aggregate a cleaned table according to one grouping request
pub fn aggregate(table: &Table, request: &GroupingRequest) -> Result<SummaryTable> {
    let key_columns = request
        .group_by
        .iter()
        .map(|c| table.schema().require(c))
        .collect::<Result<Vec<usize>>>()?;
    let plans = plan_metrics(table, request)?;

    let mut groups: BTreeMap<GroupKey, Vec<Option<Accumulator>>> = BTreeMap::new();

    'rows: for row in table.rows() {
        let mut parts = Vec::with_capacity(key_columns.len());
        for &idx in &key_columns {
            match GroupValue::from_value(&row[idx]) {
                Some(part) => parts.push(part),
                None => continue 'rows,
            }
        }

        let accumulators = groups
            .entry(GroupKey(parts))
            .or_insert_with(|| plans.iter().map(Plan::accumulator).collect());

        for (plan, acc) in plans.iter().zip(accumulators.iter_mut()) {
            let Some(acc) = acc else { continue };
            match plan {
                Plan::Column { idx, .. } => acc.update(&row[*idx], None),
                Plan::Rate { idx, equals } => acc.update(&row[*idx], Some(equals.as_str())),
                Plan::Ratio { .. } => {}
            }
        }
    }

    let mut rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut values: Vec<Option<f64>> = Vec::with_capacity(plans.len());
            for (plan, acc) in plans.iter().zip(&accumulators) {
                let value = match (plan, acc) {
                    (
                        Plan::Ratio {
                            numerator,
                            denominator,
                            scale,
                        },
                        _,
                    ) => match (values[*numerator], values[*denominator]) {
                        (Some(n), Some(d)) if d != 0.0 => Some(n / d * scale),
                        _ => None,
                    },
                    (_, Some(acc)) => acc.finish(),
                    (_, None) => None,
                };
                values.push(value);
            }
            SummaryRow { key, values }
        })
        .collect();

    if let Some(order) = &request.order_by {
        // Validated in plan_metrics
        let idx = request
            .metrics
            .iter()
            .position(|m| m.name == order.metric)
            .unwrap_or(0);
        rows.sort_by(|a, b| compare_metric(a.values[idx], b.values[idx], order.descending));
    }

    if let Some(n) = request.top_n {
        rows.truncate(n);
    }

    debug!(
        grouping = %request.name,
        groups = rows.len(),
        "Aggregation complete"
    );

    Ok(SummaryTable {
        name: request.name.clone(),
        group_by: request.group_by.clone(),
        metrics: request.metrics.iter().map(|m| m.name.clone()).collect(),
        rows,
    })
}

/// Metric ordering with missing values always last
fn compare_metric(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Run several requests against the same table, keyed by request name
pub fn aggregate_all(
    table: &Table,
    requests: &[GroupingRequest],
) -> Result<BTreeMap<String, SummaryTable>> {
    let mut summaries = BTreeMap::new();
    for request in requests {
        let summary = aggregate(table, request)?;
        if summaries.insert(request.name.clone(), summary).is_some() {
            return Err(Error::config(format!(
                "Duplicate grouping name: {}",
                request.name
            )));
        }
    }
    Ok(summaries)
}
