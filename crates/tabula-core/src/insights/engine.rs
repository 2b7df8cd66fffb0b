//! Insight Engine - runs the registered rules over summary tables

use std::collections::BTreeMap;

use crate::aggregate::SummaryTable;
use crate::Result;

use super::types::{Insight, InsightTopic, RuleBindings};
use super::{LossMakersRule, PeakPeriodRule, TopEntityRule};

/// A business rule over one summary table
pub trait Rule: Send + Sync {
    /// Topic this rule reports on; also selects its binding
    fn id(&self) -> InsightTopic;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Evaluate the rule against `metric` in `summary`
    ///
    /// Returns `Ok(None)` when the rule does not fire.
    fn evaluate(&self, summary: &SummaryTable, metric: &str) -> Result<Option<Insight>>;
}

/// Runs rules in registration order
pub struct InsightEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    /// Create an engine with the built-in rules
    pub fn new() -> Self {
        let mut engine = Self { rules: vec![] };

        engine.register(Box::new(PeakPeriodRule));
        engine.register(Box::new(LossMakersRule));
        engine.register(Box::new(TopEntityRule));

        engine
    }

    /// Register a rule; it runs after the ones already registered
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Evaluate every bound rule whose grouping is available
    ///
    /// Unbound rules and rules whose grouping was not computed are skipped.
    /// A bound metric missing from its summary is an error.
    pub fn evaluate(
        &self,
        summaries: &BTreeMap<String, SummaryTable>,
        bindings: &RuleBindings,
    ) -> Result<Vec<Insight>> {
        let mut insights = vec![];

        for rule in &self.rules {
            let Some(binding) = bindings.get(rule.id()) else {
                tracing::debug!(rule = rule.name(), "Rule not bound, skipping");
                continue;
            };
            let Some(summary) = summaries.get(&binding.grouping) else {
                tracing::debug!(
                    rule = rule.name(),
                    grouping = %binding.grouping,
                    "Grouping not available, skipping"
                );
                continue;
            };

            if let Some(insight) = rule.evaluate(summary, &binding.metric)? {
                tracing::debug!(
                    rule = rule.name(),
                    value = insight.supporting_value,
                    "Rule fired"
                );
                insights.push(insight);
            }
        }

        Ok(insights)
    }

    /// Topics of the registered rules, in evaluation order
    pub fn topics(&self) -> Vec<InsightTopic> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}

/// Format a value for insight text
pub(crate) fn amount(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GroupingRequest, MetricSpec};
    use crate::insights::RuleBinding;
    use crate::test_utils::{orders_table, OrderRow};
    use crate::Error;

    fn summaries() -> BTreeMap<String, SummaryTable> {
        let table = orders_table(&[
            OrderRow::new("2023-03-02", "Furniture", "Tables", "Texas", 200.0, -50.0),
            OrderRow::new("2023-12-10", "Furniture", "Chairs", "California", 900.0, 120.0),
            OrderRow::new("2023-12-11", "Office Supplies", "Binders", "Texas", 300.0, -10.0),
            OrderRow::new("2023-06-20", "Technology", "Phones", "California", 400.0, 80.0),
        ]);
        let requests = [
            GroupingRequest::new("monthly", ["Month"]).metric(MetricSpec::sum("Sales", "Sales")),
            GroupingRequest::new("subcategory_profit", ["Sub-Category"])
                .metric(MetricSpec::sum("Profit", "Profit")),
            GroupingRequest::new("state_sales", ["State"])
                .metric(MetricSpec::sum("Sales", "Sales")),
        ];
        crate::aggregate::aggregate_all(&table, &requests).unwrap()
    }

    fn all_bindings() -> RuleBindings {
        RuleBindings {
            peak_period: Some(RuleBinding::new("monthly", "Sales")),
            loss_makers: Some(RuleBinding::new("subcategory_profit", "Profit")),
            top_entity: Some(RuleBinding::new("state_sales", "Sales")),
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = InsightEngine::new();
        assert_eq!(
            engine.topics(),
            vec![
                InsightTopic::PeakPeriod,
                InsightTopic::LossMakers,
                InsightTopic::TopEntity
            ]
        );

        let names: Vec<&str> = engine.rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Peak Period", "Loss Makers", "Top Entity"]);
    }

    #[test]
    fn test_rules_run_in_order() {
        let insights = InsightEngine::new()
            .evaluate(&summaries(), &all_bindings())
            .unwrap();

        let topics: Vec<InsightTopic> = insights.iter().map(|i| i.topic).collect();
        assert_eq!(
            topics,
            vec![
                InsightTopic::PeakPeriod,
                InsightTopic::LossMakers,
                InsightTopic::TopEntity
            ]
        );
        assert_eq!(insights[0].supporting_value, 1200.0);
        assert_eq!(insights[2].evidence[0].group.to_string(), "California");
    }

    #[test]
    fn test_unbound_and_absent_groupings_are_skipped() {
        let mut bindings = all_bindings();
        bindings.peak_period = None;
        bindings.top_entity = Some(RuleBinding::new("region_sales", "Sales"));

        let insights = InsightEngine::new()
            .evaluate(&summaries(), &bindings)
            .unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].topic, InsightTopic::LossMakers);
    }

    #[test]
    fn test_missing_metric_is_an_error() {
        let mut bindings = all_bindings();
        bindings.loss_makers = Some(RuleBinding::new("subcategory_profit", "Margin"));

        let result = InsightEngine::new().evaluate(&summaries(), &bindings);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_summary_produces_nothing() {
        let table = orders_table(&[]);
        let request =
            GroupingRequest::new("monthly", ["Month"]).metric(MetricSpec::sum("Sales", "Sales"));
        let mut map = BTreeMap::new();
        map.insert("monthly".to_string(), aggregate(&table, &request).unwrap());

        let bindings = RuleBindings {
            peak_period: Some(RuleBinding::new("monthly", "Sales")),
            ..Default::default()
        };
        let insights = InsightEngine::new().evaluate(&map, &bindings).unwrap();
        assert!(insights.is_empty());
    }
}
