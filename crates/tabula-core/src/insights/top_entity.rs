//! Top Entity Rule
//!
//! Names the single strongest group by a volume metric (state, region, segment).

use crate::aggregate::SummaryTable;
use crate::error::Result;

use super::engine::{amount, Rule};
use super::types::{Evidence, Insight, InsightTopic};

pub struct TopEntityRule;

impl Rule for TopEntityRule {
    fn id(&self) -> InsightTopic {
        InsightTopic::TopEntity
    }

    fn name(&self) -> &'static str {
        "Top Entity"
    }

    fn evaluate(&self, summary: &SummaryTable, metric: &str) -> Result<Option<Insight>> {
        let Some((key, value)) = summary.arg_max(metric)? else {
            return Ok(None);
        };

        Ok(Some(Insight {
            topic: self.id(),
            statement: format!(
                "Top performing {}: {} with {} {}",
                summary.group_by.join(" / "),
                key,
                metric,
                amount(value)
            ),
            recommendation: "Focus marketing efforts on high-performing regions.".to_string(),
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
    fn test_top_state_by_sales() {
        let table = orders_table(&[
            OrderRow::new("2023-01-01", "A", "a", "Texas", 300.0, 1.0),
            OrderRow::new("2023-01-02", "A", "a", "New York", 250.0, 1.0),
            OrderRow::new("2023-01-03", "A", "a", "New York", 100.0, 1.0),
        ]);
        let request =
            GroupingRequest::new("state_sales", ["State"]).metric(MetricSpec::sum("Sales", "Sales"));
        let summary = aggregate(&table, &request).unwrap();

        let insight = TopEntityRule.evaluate(&summary, "Sales").unwrap().unwrap();
        assert_eq!(insight.supporting_value, 350.0);
        assert_eq!(insight.evidence[0].group.to_string(), "New York");
        assert!(insight.statement.starts_with("Top performing State: New York"));
    }
}
