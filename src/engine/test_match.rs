//! Non-indexed diagnostic matching (spec.md §4.5).
//!
//! `Engine::match_message` is deliberately silent about *why* a stream
//! didn't match — it only counts satisfied rules. This module re-derives a
//! per-rule verdict for every stream by walking each stream's original
//! `Vec<StreamRule>` directly instead of through `CompiledRules`' field
//! index, so a single unknown-rule-type or bad-regex typo doesn't have to
//! be hunted down by bisecting rules in a config file.
//!
//! It still routes REGEX evaluation through the same [`TimeoutGuard`] used
//! by the hot path, so a `test_match` run cannot hang differently than a
//! live `match_message` call would.

use super::compiled_rules::RulePayload;
use super::matchers::{apply_inversion, eval_non_regex};
use super::timeout::{GuardOutcome, TimeoutGuard};
use crate::api::{MetricsSink, RuleMatchReport, StreamTestReport};
use crate::error::RuleCompileError;
use crate::{Message, RuleType, Stream, StreamRule};

/// The outcome of evaluating one rule against one message, before
/// inversion is folded in — kept distinct from a plain `bool` so the
/// report can say "this rule failed to compile" rather than just "false".
#[derive(Debug)]
pub(crate) enum RuleOutcome {
    Matched,
    NotMatched,
    TimedOut,
    Invalid(RuleCompileError),
}

pub(crate) fn test_match(
    streams: &[Stream],
    message: &Message,
    guard: &TimeoutGuard,
    metrics: &dyn MetricsSink,
) -> Vec<StreamTestReport> {
    streams.iter().map(|stream| test_stream(stream, message, guard, metrics)).collect()
}

fn test_stream(
    stream: &Stream,
    message: &Message,
    guard: &TimeoutGuard,
    metrics: &dyn MetricsSink,
) -> StreamTestReport {
    let rule_reports: Vec<RuleMatchReport> =
        stream.rules.iter().map(|rule| test_rule(rule, message, guard, metrics)).collect();

    let matched = !rule_reports.is_empty() && rule_reports.iter().all(|r| r.matched);

    StreamTestReport { stream_id: stream.id.clone(), matched, rules: rule_reports }
}

fn test_rule(rule: &StreamRule, message: &Message, guard: &TimeoutGuard, metrics: &dyn MetricsSink) -> RuleMatchReport {
    metrics.record_evaluation();
    let value = message.get(&rule.field);

    let outcome = match evaluate_raw(rule, value, guard) {
        Ok(raw) if apply_inversion(raw, rule.inverted) => RuleOutcome::Matched,
        Ok(_) => RuleOutcome::NotMatched,
        Err(RuleOutcome::TimedOut) => {
            metrics.record_timeout(&rule.field, RuleType::Regex);
            RuleOutcome::TimedOut
        }
        Err(other) => other,
    };

    let (matched, detail) = match &outcome {
        RuleOutcome::Matched => (true, None),
        RuleOutcome::NotMatched => (false, None),
        RuleOutcome::TimedOut => (false, Some("rule timed out; treated as non-match".to_string())),
        RuleOutcome::Invalid(err) => (false, Some(err.to_string())),
    };

    RuleMatchReport {
        field: rule.field.clone(),
        rule_type: rule.rule_type.clone(),
        matched,
        detail,
    }
}

/// Compile and evaluate `rule` against `value` in one shot (test_match
/// intentionally re-compiles per call rather than caching — it is a
/// diagnostic path, not the hot path, and this keeps it honest about
/// exactly what the raw config currently says).
fn evaluate_raw(rule: &StreamRule, value: Option<&crate::FieldValue>, guard: &TimeoutGuard) -> Result<bool, RuleOutcome> {
    let rule_type = RuleType::parse(&rule.rule_type).ok_or_else(|| {
        RuleOutcome::Invalid(RuleCompileError::UnknownRuleType {
            field: rule.field.clone(),
            rule_type: rule.rule_type.clone(),
        })
    })?;

    if rule_type == RuleType::Regex {
        let pattern = regex::Regex::new(&rule.value).map_err(|source| {
            RuleOutcome::Invalid(RuleCompileError::InvalidRegex { field: rule.field.clone(), source })
        })?;
        let Some(value) = value else { return Ok(false) };
        let text = value.as_display();
        return match guard.run_regex(&pattern, &text) {
            GuardOutcome::Completed(matched) => Ok(matched),
            GuardOutcome::TimedOut => Err(RuleOutcome::TimedOut),
        };
    }

    let payload = match rule_type {
        RuleType::Presence => RulePayload::Presence,
        RuleType::Exact => RulePayload::Exact(rule.value.clone()),
        RuleType::Greater | RuleType::Smaller => RulePayload::Numeric(rule.value.trim().parse::<f64>().ok()),
        RuleType::Regex => unreachable!("handled above"),
    };
    let compiled = super::compiled_rules::CompiledRule {
        field: rule.field.clone(),
        rule_type,
        inverted: rule.inverted,
        stream_idx: 0,
        payload,
    };
    Ok(eval_non_regex(&compiled, value))
}
