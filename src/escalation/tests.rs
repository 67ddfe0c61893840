use super::*;
use crate::rules::{BoolOp, ConditionKind, ConditionOp, RuleCondition, RuleNode};
use chrono::TimeZone;
use serde_json::json;

fn low_confidence_rule(id: i64, threshold: f64) -> EscalationRule {
    EscalationRule {
        id,
        tenant_id: 1,
        name: format!("confidence below {}", threshold),
        predicate: RulePredicate {
            operator: BoolOp::And,
            conditions: vec![RuleNode::Condition(RuleCondition {
                kind: ConditionKind::Confidence,
                operator: ConditionOp::Lt,
                value: json!(threshold),
                field: None,
            })],
        },
        enabled: true,
    }
}

fn test_context(confidence: f64) -> EvaluationContext {
    let timestamp = chrono::Utc
        .with_ymd_and_hms(2024, 3, 14, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    EvaluationContext::new("how do I export my data", confidence, timestamp)
}

#[test]
fn no_rules_means_no_escalation() {
    let decision = decide(&[], &test_context(0.1));

    assert!(!decision.should_escalate);
    assert!(decision.fired.is_empty());
}

#[test]
fn matching_rule_fires_with_trace() {
    let rules = vec![low_confidence_rule(7, 0.55)];

    let decision = decide(&rules, &test_context(0.42));

    assert!(decision.should_escalate);
    assert_eq!(decision.fired.len(), 1);
    assert_eq!(decision.fired[0].rule_id, 7);
    assert!(!decision.fired[0].trace.is_empty());
}

#[test]
fn disabled_rules_are_skipped() {
    let mut rule = low_confidence_rule(7, 0.55);
    rule.enabled = false;

    let decision = decide(&[rule], &test_context(0.1));

    assert!(!decision.should_escalate);
}

#[test]
fn keyword_extraction_drops_noise() {
    let keywords = extract_keywords("What about a refund for my Refund order?");

    assert_eq!(keywords, vec!["refund", "order"]);
}

#[test]
fn keyword_extraction_strips_punctuation() {
    let keywords = extract_keywords("cancel, please! cancel.");

    assert_eq!(keywords, vec!["cancel", "please"]);
}

#[test]
fn every_matching_rule_is_reported() {
    let rules = vec![
        low_confidence_rule(1, 0.9),
        low_confidence_rule(2, 0.5),
        low_confidence_rule(3, 0.2),
    ];

    let decision = decide(&rules, &test_context(0.3));

    assert!(decision.should_escalate);
    let fired_ids: Vec<i64> = decision.fired.iter().map(|f| f.rule_id).collect();
    assert_eq!(fired_ids, vec![1, 2]);
}
