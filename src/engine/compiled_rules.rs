//! Rule compilation and indexing.
//!
//! This module holds the *static* side of the engine: the structures derived
//! once from a [`Stream`] snapshot that make every subsequent
//! [`Engine::match_message`](crate::Engine::match_message) call cheap.
//!
//! Construction iterates every stream's rules exactly once (spec.md §4.2):
//! for each valid rule it fills one of five field→rule-list maps (one per
//! [`RuleType`]) and bumps that stream's required-rule count. Rules that
//! fail to compile ([`RuleCompileError`]) are returned alongside the
//! compiled set rather than logged here — logging and metrics are an
//! `Engine::new` concern; this module stays pure, no I/O.
//!
//! ## Invariants (spec.md §3)
//!
//! - `RuleId` is an index into `CompiledRules::rules`.
//! - For each rule type `T`, every rule in `index.bucket(T)[field]` has that
//!   `field` and `rule_type == T`.
//! - `required_rules[i]` equals the number of *valid* rules on `streams[i]`.

use crate::error::RuleCompileError;
use crate::{RuleType, Stream};
use regex::Regex;
use std::collections::HashMap;

pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// Which rule types have at least one compiled rule anywhere in the
    /// snapshot. `Engine::match_message` skips an entire pass when its bit
    /// is unset — the same pruning idea as a trigger-bucket mask, applied at
    /// the type level instead of per-message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct ActiveRuleTypes: u8 {
        const PRESENCE = 1 << 0;
        const EXACT    = 1 << 1;
        const GREATER  = 1 << 2;
        const SMALLER  = 1 << 3;
        const REGEX    = 1 << 4;
    }
}

impl ActiveRuleTypes {
    fn for_type(rule_type: RuleType) -> Self {
        match rule_type {
            RuleType::Presence => ActiveRuleTypes::PRESENCE,
            RuleType::Exact => ActiveRuleTypes::EXACT,
            RuleType::Greater => ActiveRuleTypes::GREATER,
            RuleType::Smaller => ActiveRuleTypes::SMALLER,
            RuleType::Regex => ActiveRuleTypes::REGEX,
        }
    }
}

/// The rule-type-specific compiled payload. Keeping this a closed enum
/// (design note §9) rather than a trait object means matcher dispatch is a
/// single `match` in `engine/matchers.rs`, not virtual dispatch.
#[derive(Debug)]
pub(crate) enum RulePayload {
    Presence,
    /// Exact string comparand, compared byte-for-byte.
    Exact(String),
    /// Parsed numeric comparand; `None` when `StreamRule::value` itself does
    /// not parse as a finite number, in which case the rule can never match
    /// (every message is a non-match — consistent with spec §7's silent
    /// degrade-to-non-match policy).
    Numeric(Option<f64>),
    Regex(Regex),
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub(crate) field: String,
    pub(crate) rule_type: RuleType,
    pub(crate) inverted: bool,
    pub(crate) stream_idx: usize,
    pub(crate) payload: RulePayload,
}

/// Five independent field→rule-id maps, one per [`RuleType`].
#[derive(Default, Debug)]
pub(crate) struct RuleIndex {
    presence: HashMap<String, Vec<RuleId>>,
    exact: HashMap<String, Vec<RuleId>>,
    greater: HashMap<String, Vec<RuleId>>,
    smaller: HashMap<String, Vec<RuleId>>,
    regex: HashMap<String, Vec<RuleId>>,
}

impl RuleIndex {
    fn bucket_mut(&mut self, rule_type: RuleType) -> &mut HashMap<String, Vec<RuleId>> {
        match rule_type {
            RuleType::Presence => &mut self.presence,
            RuleType::Exact => &mut self.exact,
            RuleType::Greater => &mut self.greater,
            RuleType::Smaller => &mut self.smaller,
            RuleType::Regex => &mut self.regex,
        }
    }

    pub(crate) fn bucket(&self, rule_type: RuleType) -> &HashMap<String, Vec<RuleId>> {
        match rule_type {
            RuleType::Presence => &self.presence,
            RuleType::Exact => &self.exact,
            RuleType::Greater => &self.greater,
            RuleType::Smaller => &self.smaller,
            RuleType::Regex => &self.regex,
        }
    }

    /// Fields with at least one PRESENCE rule. Every rule type's pass walks
    /// its own bucket's fields directly (rather than intersecting with the
    /// message's field set) so that an inverted rule can observe absence
    /// (spec.md §4.2); PRESENCE needs its own accessor here because its pass
    /// is the one that also has to special-case "field present but empty".
    pub(crate) fn presence_fields(&self) -> impl Iterator<Item = &str> {
        self.presence.keys().map(|s| s.as_str())
    }
}

/// One compilation failure, reported for logging/metrics by the caller.
pub(crate) struct DroppedRule {
    pub(crate) stream_idx: usize,
    pub(crate) error: RuleCompileError,
}

/// Pre-compiled, indexed rule set built once from a [`Stream`] snapshot.
#[derive(Debug)]
pub(crate) struct CompiledRules {
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) index: RuleIndex,
    pub(crate) active_types: ActiveRuleTypes,
    /// Number of valid rules per stream, parallel to the original stream
    /// list. A stream matches only when its satisfied-count equals this
    /// *and* this is greater than zero (spec.md §3, `StreamMatchState`).
    pub(crate) required_rules: Vec<u32>,
}

impl CompiledRules {
    /// Compile and index every stream's rules. Returns the compiled set
    /// alongside every rule that failed to compile, in stream order.
    pub(crate) fn new(streams: &[Stream]) -> (Self, Vec<DroppedRule>) {
        let mut rules = Vec::new();
        let mut index = RuleIndex::default();
        let mut active_types = ActiveRuleTypes::empty();
        let mut required_rules = vec![0u32; streams.len()];
        let mut dropped = Vec::new();

        for (stream_idx, stream) in streams.iter().enumerate() {
            for rule in &stream.rules {
                match compile_rule(rule) {
                    Ok((rule_type, payload)) => {
                        let id = rules.len();
                        rules.push(CompiledRule {
                            field: rule.field.clone(),
                            rule_type,
                            inverted: rule.inverted,
                            stream_idx,
                            payload,
                        });
                        index.bucket_mut(rule_type).entry(rule.field.clone()).or_default().push(id);
                        active_types |= ActiveRuleTypes::for_type(rule_type);
                        required_rules[stream_idx] += 1;
                    }
                    Err(error) => dropped.push(DroppedRule { stream_idx, error }),
                }
            }
        }

        (CompiledRules { rules, index, active_types, required_rules }, dropped)
    }
}

fn compile_rule(rule: &crate::StreamRule) -> Result<(RuleType, RulePayload), RuleCompileError> {
    let rule_type = RuleType::parse(&rule.rule_type).ok_or_else(|| RuleCompileError::UnknownRuleType {
        field: rule.field.clone(),
        rule_type: rule.rule_type.clone(),
    })?;

    let payload = match rule_type {
        RuleType::Presence => RulePayload::Presence,
        RuleType::Exact => RulePayload::Exact(rule.value.clone()),
        RuleType::Greater | RuleType::Smaller => RulePayload::Numeric(rule.value.trim().parse::<f64>().ok()),
        RuleType::Regex => RulePayload::Regex(
            Regex::new(&rule.value)
                .map_err(|source| RuleCompileError::InvalidRegex { field: rule.field.clone(), source })?,
        ),
    };

    Ok((rule_type, payload))
}
