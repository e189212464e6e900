//! Per-rule-type predicates (spec.md §4.1).
//!
//! A closed set of free functions, one per [`RuleType`], dispatched by a
//! single `match` in [`eval_payload`] rather than through a matcher trait
//! object — design note §9 ("a single function per variant suffices").
//! REGEX is the only variant with non-constant cost and is the one wrapped
//! by the [`super::timeout`] guard at the call site in `engine/state.rs`;
//! the other four are evaluated directly here.
//!
//! ## Inversion
//!
//! `rule.inverted` is applied uniformly as a plain boolean negation of the
//! raw predicate result (see `apply_inversion`), for every rule type
//! including PRESENCE. Spec.md §9's open question resolves this exact
//! ambiguity — "inverted PRESENCE is true iff the field is missing or
//! empty" — which is precisely what negating the raw PRESENCE result
//! produces (raw PRESENCE on an absent/empty field is `false`, so negation
//! yields `true`). The stray sentence in §4.1 ("an inverted predicate on an
//! absent field remains false for PRESENCE") conflicts with that and is
//! treated as the "bug to be fixed rather than copied" §9 explicitly calls
//! out; DESIGN.md records the decision.

use super::compiled_rules::{CompiledRule, RulePayload};
use crate::FieldValue;

/// Evaluate one compiled rule's raw (pre-inversion) predicate against an
/// optional field value. REGEX is intentionally excluded — its timeout
/// guard wraps the call at the pass level instead.
pub(crate) fn eval_non_regex(rule: &CompiledRule, value: Option<&FieldValue>) -> bool {
    match &rule.payload {
        RulePayload::Presence => eval_presence(value),
        RulePayload::Exact(expected) => eval_exact(value, expected),
        RulePayload::Numeric(threshold) => match rule.rule_type {
            crate::RuleType::Greater => eval_greater(value, *threshold),
            crate::RuleType::Smaller => eval_smaller(value, *threshold),
            other => unreachable!("Numeric payload tagged with non-numeric rule type {other:?}"),
        },
        RulePayload::Regex(_) => unreachable!("REGEX rules are evaluated via the timeout guard"),
    }
}

/// PRESENCE: true iff the field exists and carries a non-empty value.
pub(crate) fn eval_presence(value: Option<&FieldValue>) -> bool {
    value.is_some_and(FieldValue::is_non_empty)
}

/// EXACT: true iff the field exists and its string form equals `expected`
/// byte-for-byte.
pub(crate) fn eval_exact(value: Option<&FieldValue>, expected: &str) -> bool {
    value.is_some_and(|v| v.as_display() == expected)
}

/// GREATER: true iff the field exists, both operands parse as finite
/// numbers, and the field value is strictly greater than `threshold`.
pub(crate) fn eval_greater(value: Option<&FieldValue>, threshold: Option<f64>) -> bool {
    match (value.and_then(FieldValue::as_finite_f64), threshold) {
        (Some(v), Some(t)) => v > t,
        _ => false,
    }
}

/// SMALLER: symmetric to [`eval_greater`] with strict less-than.
pub(crate) fn eval_smaller(value: Option<&FieldValue>, threshold: Option<f64>) -> bool {
    match (value.and_then(FieldValue::as_finite_f64), threshold) {
        (Some(v), Some(t)) => v < t,
        _ => false,
    }
}

// REGEX has no standalone eval_* here: `regex::Regex::is_match` already
// searches anywhere in the haystack (the "unanchored substring" semantics
// spec.md §4.1 asks for), but every REGEX evaluation must go through
// `super::timeout::TimeoutGuard::run_regex` instead of calling it directly,
// so the predicate lives in the job closure there (and in
// `engine/test_match.rs`'s diagnostic path) rather than here.

/// Negate `raw` when `inverted` is set; otherwise pass it through.
pub(crate) fn apply_inversion(raw: bool, inverted: bool) -> bool {
    if inverted { !raw } else { raw }
}
