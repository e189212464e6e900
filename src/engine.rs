//! The routing engine.
//!
//! This module is the *public entry point* for the engine. It used to be a
//! single file; it is now split into focused submodules under `src/engine/`
//! while keeping the public path stable (`crate::Engine`).
//!
//! ## How the parts work together
//!
//! ```text
//! streams (snapshot) ──┐
//!                      │  Engine::new / api::create
//!                      └──────────────┬────────────────────
//!                                     │
//!                    CompiledRules::new (compiled_rules.rs)
//!                      - five field→rule indices, one per RuleType
//!                      - ActiveRuleTypes bitmask
//!                      - per-stream required-rule counts
//!                                     │
//!                                     v
//! message ── Engine::match_message (state.rs)
//!              - PRESENCE pass over every bucketed field
//!              - EXACT/GREATER/SMALLER/REGEX passes, each over every field
//!                bucketed under that type (so absence is observable too)
//!              - REGEX invocations run under the TimeoutGuard
//!                     (timeout.rs, matchers.rs)
//!              - conjunction counted in a per-call StreamMatchState
//!                                     │
//!                                     v
//!                          Vec<stream id> (matched streams)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: derives `CompiledRules` from a `Stream` snapshot
//!   and builds the five field→rule indices plus the active-type bitmask.
//! - `matchers.rs`: the closed set of per-`RuleType` predicates.
//! - `timeout.rs`: bounds the wall-clock cost of a single REGEX invocation.
//! - `state.rs`: the `match_message` algorithm and its per-call state.
//! - `test_match.rs`: the non-indexed, per-rule diagnostic harness.
//!
//! ## Debugging
//!
//! Set `RUST_LOG=streamrouter=trace` to see per-rule evaluation traces via
//! `tracing`.

mod compiled_rules;
mod matchers;
mod state;
mod test_match;
mod timeout;

use crate::api::{EngineConfig, MetricsSink, StreamTestReport};
use crate::{Message, Stream};
use std::sync::Arc;
use timeout::TimeoutGuard;

/// A compiled, indexed snapshot of a set of streams, ready to match
/// messages. Construct via [`crate::create`], not `Engine::new` directly —
/// the latter is `pub(crate)` precisely so construction always goes through
/// the logging/metrics wiring in `api.rs`.
///
/// `Engine` is immutable once built and is both [`Send`] and [`Sync`]:
/// design note §9 chose the "shared immutable engine" concurrency model, so
/// callers share one instance across worker threads behind an `Arc` rather
/// than cloning an engine per worker.
pub struct Engine {
    stream_ids: Vec<String>,
    streams: Vec<Stream>,
    compiled: CompiledRules,
    guard: TimeoutGuard,
    metrics: Arc<dyn MetricsSink>,
}

impl Engine {
    pub(crate) fn new(
        streams: Vec<Stream>,
        compiled: CompiledRules,
        config: &EngineConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let stream_ids = streams.iter().map(|s| s.id.clone()).collect();
        let guard = TimeoutGuard::new(config.timeout_worker_threads, config.rule_timeout);
        Engine { stream_ids, streams, compiled, guard, metrics }
    }

    /// Return the ids of every stream whose full rule conjunction matches
    /// `message` (spec.md §4.3). A stream with zero valid rules never
    /// appears (drop-closed, spec.md §4.6).
    pub fn match_message(&self, message: &Message) -> Vec<String> {
        state::match_message(&self.compiled, &self.stream_ids, message, &self.guard, self.metrics.as_ref())
    }

    /// Evaluate every stream's *original* rules directly against `message`,
    /// bypassing the field-type index (spec.md §4.5). Intended for the CLI
    /// and other offline diagnostic callers, not the hot path: this reports
    /// per-rule pass/fail, which `match_message` never needs to compute.
    pub fn test_match(&self, message: &Message) -> Vec<StreamTestReport> {
        test_match::test_match(&self.streams, message, &self.guard, self.metrics.as_ref())
    }

    /// The number of streams currently loaded, including any with zero
    /// valid rules.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
};

pub(crate) use compiled_rules::{CompiledRules, DroppedRule};
