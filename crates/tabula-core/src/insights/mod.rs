//! Insight Engine - rule-based business insights
//!
//! Each rule reads one summary table produced by the aggregation engine and
//! either fires with the exact values that triggered it or stays silent.
//! Which grouping and metric a rule reads is configured per run through
//! [`RuleBindings`].
//!
//! ## Built-in Rules
//!
//! - **Peak Period** - group with the highest time-based metric
//! - **Loss Makers** - groups with negative profit, worst first
//! - **Top Entity** - group with the highest volume
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabula_core::insights::{InsightEngine, RuleBindings};
//!
//! let engine = InsightEngine::new();
//! let insights = engine.evaluate(&summaries, &bindings)?;
//! ```

pub mod engine;
pub mod loss_makers;
pub mod peak_period;
pub mod top_entity;
pub mod types;

pub use engine::{InsightEngine, Rule};
pub use loss_makers::LossMakersRule;
pub use peak_period::PeakPeriodRule;
pub use top_entity::TopEntityRule;
pub use types::{Evidence, Insight, InsightTopic, RuleBinding, RuleBindings};
