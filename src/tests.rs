//! End-to-end scenarios, in the spirit of the teacher's large standalone
//! `rules/numeral/tests.rs` table: one file exercising the public surface
//! top to bottom, rather than scattering every case across inline
//! `#[cfg(test)]` blocks.

use crate::{create, EngineConfig, FieldValue, Message, RuleType, Stream, StreamRule};
use std::sync::Arc;

fn msg(pairs: &[(&str, FieldValue)]) -> Message {
    pairs.iter().fold(Message::new(), |m, (k, v)| m.with(*k, v.clone()))
}

#[test]
fn exact_and_presence_conjunction_matches_only_when_both_hold() {
    let streams = vec![Stream::new("errors")
        .with_rule(StreamRule::new("level", RuleType::Exact, "ERROR"))
        .with_rule(StreamRule::new("host", RuleType::Presence, ""))];
    let result = create(streams, EngineConfig::default());

    let both = msg(&[("level", FieldValue::String("ERROR".into())), ("host", FieldValue::String("db-1".into()))]);
    assert_eq!(result.engine.match_message(&both), vec!["errors".to_string()]);

    let missing_host = msg(&[("level", FieldValue::String("ERROR".into()))]);
    assert!(result.engine.match_message(&missing_host).is_empty());

    let wrong_level = msg(&[("level", FieldValue::String("WARN".into())), ("host", FieldValue::String("db-1".into()))]);
    assert!(result.engine.match_message(&wrong_level).is_empty());
}

#[test]
fn inverted_exact_matches_when_field_is_absent() {
    let streams =
        vec![Stream::new("not-staging").with_rule(StreamRule::new("env", RuleType::Exact, "staging").inverted())];
    let result = create(streams, EngineConfig::default());

    let absent = Message::new();
    assert_eq!(result.engine.match_message(&absent), vec!["not-staging".to_string()]);

    let staging = msg(&[("env", FieldValue::String("staging".into()))]);
    assert!(result.engine.match_message(&staging).is_empty());

    let prod = msg(&[("env", FieldValue::String("prod".into()))]);
    assert_eq!(result.engine.match_message(&prod), vec!["not-staging".to_string()]);
}

#[test]
fn greater_is_strict() {
    let streams = vec![Stream::new("slow").with_rule(StreamRule::new("latency_ms", RuleType::Greater, "100"))];
    let result = create(streams, EngineConfig::default());

    assert!(result.engine.match_message(&msg(&[("latency_ms", FieldValue::Number(100.0))])).is_empty());
    assert_eq!(
        result.engine.match_message(&msg(&[("latency_ms", FieldValue::Number(100.1))])),
        vec!["slow".to_string()]
    );
}

#[test]
fn regex_rule_timing_out_is_treated_as_non_match_and_counted() {
    // A pathological-by-construction pattern is unnecessary: the guard's
    // budget is the variable under test, not the regex engine's
    // worst-case complexity. A zero-duration budget forces every call to
    // exceed it regardless of how fast the match itself runs.
    let metrics = Arc::new(crate::AtomicMetrics::new());
    let streams = vec![Stream::new("matches-anything").with_rule(StreamRule::new("msg", RuleType::Regex, ".*"))];
    let config = EngineConfig { rule_timeout: std::time::Duration::from_nanos(0), ..EngineConfig::default() };
    let result = crate::create_with_metrics(streams, config, metrics.clone());

    let message = msg(&[("msg", FieldValue::String("anything at all".into()))]);
    assert!(result.engine.match_message(&message).is_empty());
    assert!(metrics.snapshot().timeouts >= 1);
}

#[test]
fn overlapping_rule_sets_across_streams_each_evaluate_independently() {
    let streams = vec![
        Stream::new("E").with_rule(StreamRule::new("level", RuleType::Exact, "ERROR")),
        Stream::new("F")
            .with_rule(StreamRule::new("level", RuleType::Exact, "ERROR"))
            .with_rule(StreamRule::new("service", RuleType::Exact, "billing")),
    ];
    let result = create(streams, EngineConfig::default());

    let error_billing =
        msg(&[("level", FieldValue::String("ERROR".into())), ("service", FieldValue::String("billing".into()))]);
    let mut matched = result.engine.match_message(&error_billing);
    matched.sort();
    assert_eq!(matched, vec!["E".to_string(), "F".to_string()]);

    let error_other =
        msg(&[("level", FieldValue::String("ERROR".into())), ("service", FieldValue::String("auth".into()))]);
    assert_eq!(result.engine.match_message(&error_other), vec!["E".to_string()]);
}

#[test]
fn dropped_regex_rule_reduces_required_count_but_keeps_stream() {
    let streams = vec![Stream::new("s1")
        .with_rule(StreamRule::new("host", RuleType::Presence, ""))
        .with_rule(StreamRule::new("msg", RuleType::Regex, "("))];
    let result = create(streams, EngineConfig::default());

    assert_eq!(result.dropped.len(), 1);
    assert_eq!(result.dropped[0].reason, crate::DropReason::InvalidRegex);
    assert_eq!(result.engine.stream_count(), 1);

    // Only the surviving PRESENCE rule is required now.
    assert_eq!(
        result.engine.match_message(&msg(&[("host", FieldValue::String("db-1".into()))])),
        vec!["s1".to_string()]
    );
}

#[test]
fn stream_with_zero_valid_rules_never_matches() {
    let streams = vec![Stream::new("empty")];
    let result = create(streams, EngineConfig::default());
    assert!(result.engine.match_message(&Message::new()).is_empty());
    assert!(result.engine.match_message(&msg(&[("anything", FieldValue::String("x".into()))])).is_empty());
}

#[test]
fn test_match_reports_every_rule_independently_of_match_message() {
    let streams = vec![Stream::new("s1")
        .with_rule(StreamRule::new("level", RuleType::Exact, "ERROR"))
        .with_rule(StreamRule::new("host", RuleType::Presence, ""))];
    let result = create(streams, EngineConfig::default());

    let message = msg(&[("level", FieldValue::String("ERROR".into()))]);
    let reports = result.engine.test_match(&message);
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].matched);
    assert_eq!(reports[0].rules.len(), 2);
    assert!(reports[0].rules.iter().find(|r| r.field == "level").unwrap().matched);
    assert!(!reports[0].rules.iter().find(|r| r.field == "host").unwrap().matched);
}

#[test]
fn streams_and_message_round_trip_through_json() {
    let streams = vec![Stream::new("s1").with_rule(StreamRule::new("level", RuleType::Exact, "ERROR"))];
    let json = serde_json::to_string(&streams).unwrap();
    let back: Vec<Stream> = serde_json::from_str(&json).unwrap();
    assert_eq!(back[0].id, "s1");
    assert_eq!(back[0].rules[0].rule_type, "EXACT");

    let message = msg(&[("level", FieldValue::String("ERROR".into()))]);
    let message_json = serde_json::to_string(&message).unwrap();
    let back_message: Message = serde_json::from_str(&message_json).unwrap();
    assert_eq!(back_message.get("level"), Some(&FieldValue::String("ERROR".into())));
}
