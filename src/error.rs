//! Construction-time error taxonomy.
//!
//! Per spec.md §7, these never escape [`crate::create`]: a rule that fails
//! to compile is logged (`tracing::warn!`) and dropped, which is reflected
//! in the stream's required-rule count (a stream whose only rule was
//! dropped requires zero rules and therefore never matches — drop-closed).
//!
//! This module exists only so construction has a structured value to log
//! and to report through [`crate::api::MetricsSink::record_dropped_rule`];
//! nothing downstream ever constructs a `Result` around it.

#[derive(Debug, thiserror::Error)]
pub enum RuleCompileError {
    #[error("unknown rule type {rule_type:?} for field {field:?}")]
    UnknownRuleType { field: String, rule_type: String },

    #[error("invalid regex for field {field:?}: {source}")]
    InvalidRegex { field: String, #[source] source: regex::Error },
}
