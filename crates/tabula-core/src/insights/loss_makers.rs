//! Loss Makers Rule
//!
//! Lists every group whose profitability metric is negative, worst first.

use crate::aggregate::SummaryTable;
use crate::error::Result;

use super::engine::{amount, Rule};
use super::types::{Evidence, Insight, InsightTopic};

pub struct LossMakersRule;

impl Rule for LossMakersRule {
    fn id(&self) -> InsightTopic {
        InsightTopic::LossMakers
    }

    fn name(&self) -> &'static str {
        "Loss Makers"
    }

    fn evaluate(&self, summary: &SummaryTable, metric: &str) -> Result<Option<Insight>> {
        let mut losses: Vec<Evidence> = summary
            .values_of(metric)?
            .into_iter()
            .filter(|(_, value)| *value < 0.0)
            .map(|(key, value)| Evidence {
                group: key.clone(),
                value,
            })
            .collect();

        if losses.is_empty() {
            return Ok(None);
        }

        // Stable: equal losses keep summary order
        losses.sort_by(|a, b| a.value.total_cmp(&b.value));

        let names: Vec<String> = losses
            .iter()
            .map(|e| format!("{} ({})", e.group, amount(e.value)))
            .collect();
        let dimension = summary.group_by.join(" / ");

        Ok(Some(Insight {
            topic: self.id(),
            statement: format!(
                "Loss-making {} groups identified: {}",
                dimension,
                names.join(", ")
            ),
            recommendation: "Review pricing strategy or consider discontinuation.".to_string(),
            supporting_value: losses[0].value,
            grouping: summary.name.clone(),
            metric: metric.to_string(),
            evidence: losses,
        }))
    }
}
