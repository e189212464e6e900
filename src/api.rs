//! The public construction surface: [`create`], [`EngineConfig`], and the
//! pluggable [`MetricsSink`].
//!
//! Everything an `Engine` needs beyond the raw [`crate::Stream`] snapshot —
//! the per-rule timeout budget, the size of its timeout worker pool, and
//! where its counters go — is gathered here rather than threaded through
//! `Engine::new` as loose parameters, the way the teacher crate's
//! `api::parse_with` centralizes a `Context`/`Options` pair alongside the
//! compiled core it builds on.

use crate::engine::{CompiledRules, DroppedRule};
use crate::error::RuleCompileError;
use crate::{Engine, RuleType, Stream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs for [`create`]. `Default` mirrors spec.md §6's suggested
/// defaults: a 5ms per-rule regex budget and two timeout worker threads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget for a single REGEX rule evaluation (spec.md §4.4).
    pub rule_timeout: Duration,
    /// Size of the background worker pool backing the timeout guard.
    pub timeout_worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { rule_timeout: Duration::from_millis(5), timeout_worker_threads: 2 }
    }
}

/// Why a rule never made it into the compiled engine.
///
/// A `Copy`-able classification of [`RuleCompileError`] for callers who
/// want to count drop reasons without matching on the error's `Display`
/// text; [`DropReport`] carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownRuleType,
    InvalidRegex,
}

impl From<&RuleCompileError> for DropReason {
    fn from(error: &RuleCompileError) -> Self {
        match error {
            RuleCompileError::UnknownRuleType { .. } => DropReason::UnknownRuleType,
            RuleCompileError::InvalidRegex { .. } => DropReason::InvalidRegex,
        }
    }
}

/// One rule that was dropped at construction, reported for the caller's own
/// logging/alerting (spec.md §4.6: drops are visible, not silent, at the
/// `create` boundary — only `match_message` silently treats a dropped
/// stream as having nothing left to satisfy).
#[derive(Debug, Clone)]
pub struct DropReport {
    pub stream_id: String,
    pub field: String,
    pub reason: DropReason,
    pub detail: String,
}

/// Per-rule outcome in a [`StreamTestReport`] (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct RuleMatchReport {
    pub field: String,
    pub rule_type: String,
    pub matched: bool,
    /// Populated when `matched` is `false` for a reason worth surfacing:
    /// an unknown rule type, a bad regex, or a timeout.
    pub detail: Option<String>,
}

/// Per-stream outcome of [`crate::Engine::test_match`].
#[derive(Debug, Clone)]
pub struct StreamTestReport {
    pub stream_id: String,
    /// True iff every rule in `rules` matched and `rules` is non-empty
    /// (drop-closed streams with zero rules never report `matched: true`).
    pub matched: bool,
    pub rules: Vec<RuleMatchReport>,
}

/// Host-pluggable counters (spec.md §7). The engine never reads these back
/// — they exist purely for the embedding application's own observability,
/// the same role `tracing` spans play for logging here. Implement this
/// trait to forward into an external metrics system; use [`AtomicMetrics`]
/// for a basic in-process counter, or [`NullMetrics`] to disable entirely.
pub trait MetricsSink: Send + Sync {
    /// One rule (of any type) was evaluated against a message.
    fn record_evaluation(&self) {}
    /// A REGEX rule exceeded its timeout budget and was treated as a
    /// non-match.
    fn record_timeout(&self, _field: &str, _rule_type: RuleType) {}
    /// One rule failed to compile at construction and was dropped.
    fn record_dropped_rule(&self, _stream_id: &str, _reason: DropReason) {}
}

/// A [`MetricsSink`] that discards everything. The default when no sink is
/// supplied to [`create`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {}

/// A simple in-process [`MetricsSink`] backed by atomics, for callers who
/// want basic counters without wiring in an external metrics crate.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    evaluations: AtomicU64,
    timeouts: AtomicU64,
    dropped_rules: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            dropped_rules: self.dropped_rules.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn record_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_timeout(&self, _field: &str, _rule_type: RuleType) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_rule(&self, _stream_id: &str, _reason: DropReason) {
        self.dropped_rules.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time read of [`AtomicMetrics`]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub evaluations: u64,
    pub timeouts: u64,
    pub dropped_rules: u64,
}

/// The result of [`create`]: the engine itself, plus a report of every rule
/// that was dropped while compiling the snapshot.
pub struct CreateResult {
    pub engine: Engine,
    pub dropped: Vec<DropReport>,
}

/// Compile `streams` into a ready-to-query [`Engine`] (spec.md §4.2/§4.6).
///
/// Rules that fail to compile — an unrecognized `rule_type`, or a REGEX
/// rule whose `value` isn't a valid pattern — are logged via `tracing::warn!`
/// and dropped individually; the owning stream is kept with whatever rules
/// survived (possibly none, in which case it can never match).
pub fn create(streams: Vec<Stream>, config: EngineConfig) -> CreateResult {
    create_with_metrics(streams, config, Arc::new(NullMetrics))
}

/// Like [`create`], but routes construction- and run-time counters through
/// a caller-supplied [`MetricsSink`] (e.g. an [`AtomicMetrics`], or a custom
/// adapter into an external metrics system).
pub fn create_with_metrics(streams: Vec<Stream>, config: EngineConfig, metrics: Arc<dyn MetricsSink>) -> CreateResult {
    let (compiled, dropped_rules) = CompiledRules::new(&streams);
    let dropped = dropped_rules.into_iter().map(|d| report_drop(&streams, d, metrics.as_ref())).collect();
    let engine = Engine::new(streams, compiled, &config, metrics);
    CreateResult { engine, dropped }
}

fn report_drop(streams: &[Stream], dropped: DroppedRule, metrics: &dyn MetricsSink) -> DropReport {
    let stream_id = streams[dropped.stream_idx].id.clone();
    let reason = DropReason::from(&dropped.error);
    tracing::warn!(stream_id = %stream_id, error = %dropped.error, "dropped rule at construction");
    metrics.record_dropped_rule(&stream_id, reason);

    let field = match &dropped.error {
        RuleCompileError::UnknownRuleType { field, .. } => field.clone(),
        RuleCompileError::InvalidRegex { field, .. } => field.clone(),
    };

    DropReport { stream_id, field, reason, detail: dropped.error.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuleType, StreamRule};

    #[test]
    fn create_drops_unknown_rule_type_and_keeps_stream() {
        let streams = vec![
            Stream::new("s1")
                .with_rule(StreamRule::new("host", RuleType::Presence, ""))
                .with_rule(StreamRule {
                    field: "level".to_string(),
                    rule_type: "BOGUS".to_string(),
                    value: String::new(),
                    inverted: false,
                }),
        ];

        let result = create(streams, EngineConfig::default());
        assert_eq!(result.dropped.len(), 1);
        assert_eq!(result.dropped[0].reason, DropReason::UnknownRuleType);
        assert_eq!(result.engine.stream_count(), 1);
    }

    #[test]
    fn atomic_metrics_counts_dropped_rules() {
        let metrics = Arc::new(AtomicMetrics::new());
        let streams = vec![Stream::new("s1").with_rule(StreamRule {
            field: "level".to_string(),
            rule_type: "BOGUS".to_string(),
            value: String::new(),
            inverted: false,
        })];

        let _ = create_with_metrics(streams, EngineConfig::default(), metrics.clone());
        assert_eq!(metrics.snapshot().dropped_rules, 1);
    }
}
