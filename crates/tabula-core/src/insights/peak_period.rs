//! Peak Period Rule
//!
//! Finds the period with the highest value of a time-based metric, e.g. the
//! month with the highest average order value.

use crate::aggregate::SummaryTable;
use crate::error::Result;

use super::engine::{amount, Rule};
use super::types::{Evidence, Insight, InsightTopic};

pub struct PeakPeriodRule;

impl Rule for PeakPeriodRule {
    fn id(&self) -> InsightTopic {
        InsightTopic::PeakPeriod
    }

    fn name(&self) -> &'static str {
        "Peak Period"
    }

    fn evaluate(&self, summary: &SummaryTable, metric: &str) -> Result<Option<Insight>> {
        let Some((key, value)) = summary.arg_max(metric)? else {
            return Ok(None);
        };

        Ok(Some(Insight {
            topic: self.id(),
            statement: format!(
                "Peak {} occurs in {} ({})",
                metric,
                key.label(&summary.group_by),
                amount(value)
            ),
            recommendation: "Consider increasing inventory and marketing ahead of this period."
                .to_string(),
            supporting_value: value,
            grouping: summary.name.clone(),
            metric: metric.to_string(),
            evidence: vec![Evidence {
                group: key.clone(),
                value,
            }],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GroupingRequest, MetricSpec};
    use crate::test_utils::{orders_table, OrderRow};

    #[test]
    fn test_peak_month_uses_mean() {
        // One large December order beats several small June orders on average
        let table = orders_table(&[
            OrderRow::new("2022-06-01", "A", "a", "Ohio", 100.0, 1.0),
            OrderRow::new("2022-06-02", "A", "b", "Ohio", 100.0, 1.0),
            OrderRow::new("2022-06-03", "A", "c", "Ohio", 100.0, 1.0),
            OrderRow::new("2022-12-24", "A", "a", "Ohio", 250.0, 1.0),
        ]);
        let request = GroupingRequest::new("monthly_average", ["Month"])
            .metric(MetricSpec::mean("Avg Sales", "Sales"));
        let summary = aggregate(&table, &request).unwrap();

        let insight = PeakPeriodRule.evaluate(&summary, "Avg Sales").unwrap().unwrap();
        assert_eq!(insight.topic, InsightTopic::PeakPeriod);
        assert_eq!(insight.supporting_value, 250.0);
        assert_eq!(insight.evidence[0].group.to_string(), "12");
        assert!(insight.statement.contains("Month=12"));
    }

    #[test]
    fn test_peak_over_year_and_month() {
        let table = orders_table(&[
            OrderRow::new("2023-11-15", "A", "a", "Ohio", 500.0, 1.0),
            OrderRow::new("2023-12-15", "A", "a", "Ohio", 900.0, 1.0),
            OrderRow::new("2023-01-15", "A", "a", "Ohio", 200.0, 1.0),
        ]);
        let request = GroupingRequest::new("monthly_sales", ["Year", "Month"])
            .metric(MetricSpec::sum("Sales", "Sales"));
        let summary = aggregate(&table, &request).unwrap();

        let insight = PeakPeriodRule.evaluate(&summary, "Sales").unwrap().unwrap();
        assert_eq!(insight.supporting_value, 900.0);
        assert_eq!(insight.evidence.len(), 1);
        assert_eq!(insight.evidence[0].group.to_string(), "2023 / 12");
        assert_eq!(insight.evidence[0].value, 900.0);
        assert!(insight.statement.contains("Year=2023, Month=12"));
    }
}
