//! A conjunction-rule stream routing engine.
//!
//! This crate is the hot path of a log-ingestion pipeline: every inbound
//! [`Message`] is checked against a pre-indexed set of [`Stream`]s, each
//! carrying an ordered, ANDed list of [`StreamRule`]s over message fields.
//! [`Engine::match_message`] returns the subset of streams whose entire rule
//! set matches.
//!
//! ## How the parts work together
//!
//! ```text
//! streams (snapshot) ──┐
//!                      │  Engine::create / EngineConfig   (api.rs)
//!                      └──────────────┬────────────────────
//!                                     │
//!                    CompiledRules::new (engine/compiled_rules.rs)
//!                      - five field→rule indices, one per RuleType
//!                      - ActiveRuleTypes bitmask
//!                      - per-stream required-rule counts
//!                                     │
//!                                     v
//! message ── Engine::match_message (engine/state.rs)
//!              - PRESENCE pass over every bucketed field
//!              - EXACT/GREATER/SMALLER/REGEX passes, each over every field
//!                bucketed under that type (so absence is observable too)
//!              - matcher invocations run under the TimeoutGuard
//!                     (engine/timeout.rs, engine/matchers.rs)
//!              - conjunction counted in a per-call StreamMatchState
//!                                     │
//!                                     v
//!                          Vec<stream id> (matched streams)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `engine/compiled_rules.rs`: derives the five rule indices and the
//!   active-rule-type bitmask from a `Stream` snapshot.
//! - `engine/matchers.rs`: the closed set of per-`RuleType` predicates.
//! - `engine/timeout.rs`: bounds the wall-clock cost of a single matcher
//!   invocation (specialized to REGEX).
//! - `engine/state.rs`: the `match_message` algorithm and the transient
//!   per-call conjunction state.
//! - `engine/test_match.rs`: the non-indexed, per-rule diagnostic harness.
//! - `api.rs`: the public surface (`create`, `EngineConfig`, `MetricsSink`).
//! - `error.rs`: construction-time error taxonomy (never surfaces past
//!   `create`; bad rules are logged and dropped).
//!
//! ## Debugging
//!
//! Set `RUST_LOG=streamrouter=trace` to see per-rule evaluation traces via
//! `tracing`.

mod engine;
mod error;

pub mod api;

pub use api::{
    AtomicMetrics, CreateResult, DropReason, DropReport, EngineConfig, MetricsSink, MetricsSnapshot, NullMetrics,
    RuleMatchReport, StreamTestReport, create, create_with_metrics,
};
pub use engine::Engine;
pub use error::RuleCompileError;

#[cfg(test)]
#[path = "tests.rs"]
mod integration_tests;

use std::borrow::Cow;
use std::collections::HashMap;

// --- Core data model ---------------------------------------------------------

/// One named field's value in an inbound [`Message`].
///
/// Kept as a small closed enum (rather than a `serde_json::Value`) to match
/// the spec's data model exactly: a field is a string, a number, or absent
/// (absence is "no entry in the map", not a variant here).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Number(f64),
}

impl FieldValue {
    /// Render the value as its string form, used by EXACT/REGEX matching.
    ///
    /// Integral numbers are formatted without a trailing `.0` so that
    /// `EXACT field=500` matches a field carrying the number `500.0`.
    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            FieldValue::String(s) => Cow::Borrowed(s),
            FieldValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Cow::Owned((*n as i64).to_string()),
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Parse the value as a finite `f64`, used by GREATER/SMALLER matching.
    /// Non-numeric strings yield `None` rather than an error (spec §7,
    /// `MalformedMessageField`: silent non-match, never raised).
    pub fn as_finite_f64(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::String(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// True for the PRESENCE predicate: the field exists and is non-empty.
    /// An empty string is treated as "no value" per design note §9.
    pub fn is_non_empty(&self) -> bool {
        match self {
            FieldValue::String(s) => !s.is_empty(),
            FieldValue::Number(_) => true,
        }
    }
}

/// A single inbound log message: a map from field name to value.
///
/// Keys are unique; iteration order is irrelevant to matching.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Message(pub HashMap<String, FieldValue>);

impl Message {
    pub fn new() -> Self {
        Message(HashMap::new())
    }

    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }
}

/// The five recognized stream-rule predicate kinds.
///
/// This is the *compiled* representation; at the config boundary a rule's
/// type is carried as a raw string (`StreamRule::rule_type`) precisely so
/// that an unrecognized value can be reported and the single offending rule
/// dropped (spec.md §4.1) instead of failing the whole stream snapshot, the
/// way a typed enum deriving `Deserialize` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    Presence,
    Exact,
    Greater,
    Smaller,
    Regex,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Presence => "PRESENCE",
            RuleType::Exact => "EXACT",
            RuleType::Greater => "GREATER",
            RuleType::Smaller => "SMALLER",
            RuleType::Regex => "REGEX",
        }
    }

    /// Parse a config-supplied rule type name, case-insensitively.
    /// Returns `None` for anything outside the recognized set (spec.md
    /// §4.1's "unknown rule types are reported and skipped").
    pub fn parse(raw: &str) -> Option<RuleType> {
        match raw.to_ascii_uppercase().as_str() {
            "PRESENCE" => Some(RuleType::Presence),
            "EXACT" => Some(RuleType::Exact),
            "GREATER" => Some(RuleType::Greater),
            "SMALLER" => Some(RuleType::Smaller),
            "REGEX" => Some(RuleType::Regex),
            _ => None,
        }
    }
}

/// A predicate over one named message field, as carried by config.
///
/// `rule_type` and `value` are free text at this layer: `Engine::create`
/// (via `RuleType::parse`) resolves `rule_type`, EXACT/REGEX treat `value`
/// as a string, GREATER/SMALLER parse it as a number at construction time,
/// and PRESENCE ignores it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamRule {
    pub field: String,
    pub rule_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub inverted: bool,
}

impl StreamRule {
    pub fn new(field: impl Into<String>, rule_type: RuleType, value: impl Into<String>) -> Self {
        StreamRule { field: field.into(), rule_type: rule_type.as_str().to_string(), value: value.into(), inverted: false }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }
}

/// An identified routing destination: a stable id plus an ordered,
/// conjunctive (AND) list of [`StreamRule`]s. A stream with zero *valid*
/// rules never matches any message (spec.md §3, drop-closed per §4.6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stream {
    pub id: String,
    #[serde(default)]
    pub rules: Vec<StreamRule>,
}

impl Stream {
    pub fn new(id: impl Into<String>) -> Self {
        Stream { id: id.into(), rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: StreamRule) -> Self {
        self.rules.push(rule);
        self
    }
}
