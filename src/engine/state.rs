//! The `match_message` algorithm (spec.md §4.3) and its transient per-call
//! conjunction state.
//!
//! ```text
//! (1) PRESENCE pass   — iterate fields/rules directly (needs absence too)
//! (2) EXACT pass      — iterate fields_by_type(EXACT)/rules directly
//! (3) GREATER pass    — iterate fields_by_type(GREATER)/rules directly
//! (4) SMALLER pass    — iterate fields_by_type(SMALLER)/rules directly
//! (5) REGEX pass      — iterate fields_by_type(REGEX)/rules directly, guarded
//! (6) collect streams where satisfied_count == required_rules > 0
//! ```
//!
//! Every pass walks its own bucket's fields rather than intersecting with
//! the message's field set: an inverted rule's raw predicate on a field the
//! message doesn't carry is still `false`, and negation then makes the rule
//! satisfied (spec.md §4.1, scenario 2), so absence must be observable for
//! all five rule types, not only PRESENCE.
//!
//! Order (PRESENCE, EXACT, GREATER, SMALLER, REGEX) is fixed and
//! fastest-first, per spec.md §4.3 — not for correctness (the result is a
//! pure conjunction count, order-independent) but because it's free to bias
//! toward cheap work first.
//!
//! `satisfied` is the `StreamMatchState` of spec.md §3: a flat `Vec<u32>`
//! indexed by stream position, allocated once per call and otherwise
//! untouched (design note §9's "stack-local mapping"), which is why this
//! function takes `&self` — nothing here mutates the `Engine`.

use super::compiled_rules::{ActiveRuleTypes, CompiledRules, RulePayload};
use super::matchers::{apply_inversion, eval_non_regex, eval_presence};
use super::timeout::{GuardOutcome, TimeoutGuard};
use crate::api::MetricsSink;
use crate::{Message, RuleType};

pub(crate) fn match_message(
    compiled: &CompiledRules,
    stream_ids: &[String],
    message: &Message,
    guard: &TimeoutGuard,
    metrics: &dyn MetricsSink,
) -> Vec<String> {
    let mut satisfied = vec![0u32; stream_ids.len()];

    if compiled.active_types.contains(ActiveRuleTypes::PRESENCE) {
        run_presence_pass(compiled, message, metrics, &mut satisfied);
    }
    for rule_type in [RuleType::Exact, RuleType::Greater, RuleType::Smaller] {
        if compiled.active_types.contains(active_bit(rule_type)) {
            run_indexed_pass(compiled, rule_type, message, metrics, &mut satisfied);
        }
    }
    if compiled.active_types.contains(ActiveRuleTypes::REGEX) {
        run_regex_pass(compiled, message, guard, metrics, &mut satisfied);
    }

    stream_ids
        .iter()
        .enumerate()
        .filter(|&(idx, _)| {
            let required = compiled.required_rules[idx];
            required > 0 && satisfied[idx] == required
        })
        .map(|(_, id)| id.clone())
        .collect()
}

fn active_bit(rule_type: RuleType) -> ActiveRuleTypes {
    match rule_type {
        RuleType::Presence => ActiveRuleTypes::PRESENCE,
        RuleType::Exact => ActiveRuleTypes::EXACT,
        RuleType::Greater => ActiveRuleTypes::GREATER,
        RuleType::Smaller => ActiveRuleTypes::SMALLER,
        RuleType::Regex => ActiveRuleTypes::REGEX,
    }
}

/// PRESENCE cannot be pruned by message-field intersection (it must see
/// absence to support inversion), so it walks every field that has a
/// PRESENCE rule and looks the field up in the message, rather than the
/// other way around.
fn run_presence_pass(
    compiled: &CompiledRules,
    message: &Message,
    metrics: &dyn MetricsSink,
    satisfied: &mut [u32],
) {
    let bucket = compiled.index.bucket(RuleType::Presence);
    for field in compiled.index.presence_fields() {
        let value = message.get(field);
        for &id in &bucket[field] {
            let rule = &compiled.rules[id];
            metrics.record_evaluation();
            let raw = eval_presence(value);
            if apply_inversion(raw, rule.inverted) {
                satisfied[rule.stream_idx] += 1;
            }
        }
    }
}

/// EXACT/GREATER/SMALLER share the same shape. Like the PRESENCE pass, this
/// walks every field that has a rule of this type rather than only the
/// fields present in the message: an inverted rule on a field the message
/// doesn't carry must still be seen as a candidate, since its raw predicate
/// (field absent) is `false` and negation then makes it satisfied (spec.md
/// §4.1, scenario 2). `message.get` returning `None` is itself `eval_*`'s
/// signal for "field absent", so no separate presence check is needed here.
fn run_indexed_pass(
    compiled: &CompiledRules,
    rule_type: RuleType,
    message: &Message,
    metrics: &dyn MetricsSink,
    satisfied: &mut [u32],
) {
    let bucket = compiled.index.bucket(rule_type);
    for (field, ids) in bucket {
        let value = message.get(field);
        for &id in ids {
            let rule = &compiled.rules[id];
            metrics.record_evaluation();
            let raw = eval_non_regex(rule, value);
            if apply_inversion(raw, rule.inverted) {
                satisfied[rule.stream_idx] += 1;
            }
        }
    }
}

/// Same "see absence too" requirement as [`run_indexed_pass`], but REGEX
/// additionally must not pay the timeout-guard's thread round-trip for a
/// field the message doesn't even carry — there's no text to search, so the
/// raw predicate is `false` without invoking the guard at all.
fn run_regex_pass(
    compiled: &CompiledRules,
    message: &Message,
    guard: &TimeoutGuard,
    metrics: &dyn MetricsSink,
    satisfied: &mut [u32],
) {
    let bucket = compiled.index.bucket(RuleType::Regex);
    for (field, ids) in bucket {
        let value = message.get(field);

        for &id in ids {
            let rule = &compiled.rules[id];
            let RulePayload::Regex(pattern) = &rule.payload else {
                unreachable!("REGEX bucket contains a non-regex payload");
            };

            metrics.record_evaluation();
            let raw = match value {
                None => false,
                Some(value) => {
                    let text = value.as_display();
                    match guard.run_regex(pattern, &text) {
                        GuardOutcome::Completed(matched) => matched,
                        GuardOutcome::TimedOut => {
                            tracing::warn!(
                                field = %rule.field,
                                pattern = %pattern.as_str(),
                                budget = ?guard.budget(),
                                "regex rule exceeded timeout budget; treating as non-match"
                            );
                            metrics.record_timeout(&rule.field, RuleType::Regex);
                            false
                        }
                    }
                }
            };

            if apply_inversion(raw, rule.inverted) {
                satisfied[rule.stream_idx] += 1;
            }
        }
    }
}
