use super::*;
use serde_json::json;

fn answer_row(keywords: &str, tags: &str) -> CuratedAnswerRow {
    CuratedAnswerRow {
        id: 1,
        tenant_id: 10,
        site_id: None,
        question: "How do refunds work?".to_string(),
        answer: "Refunds are processed within five business days.".to_string(),
        priority: 5,
        keywords: keywords.to_string(),
        tags: tags.to_string(),
        status: CuratedStatus::Active,
        created_date: chrono::NaiveDateTime::default(),
    }
}

#[test]
fn curated_answer_decodes_json_columns() {
    let row = answer_row(r#"["refund", "money back"]"#, r#"["billing"]"#);

    let answer = CuratedAnswer::try_from(row).expect("row should decode");

    assert_eq!(answer.keywords, vec!["refund", "money back"]);
    assert_eq!(answer.tags, vec!["billing"]);
}

#[test]
fn curated_answer_rejects_malformed_keywords() {
    let row = answer_row("not json", "[]");

    let error = CuratedAnswer::try_from(row).expect_err("garbage keywords must fail");

    assert!(error.to_string().contains("keywords"));
}

#[test]
fn escalation_rule_decodes_predicate() {
    let predicate = json!({
        "operator": "and",
        "conditions": [{"type": "confidence", "operator": "lt", "value": 0.5}]
    });
    let row = EscalationRuleRow {
        id: 3,
        tenant_id: 10,
        name: "low confidence".to_string(),
        predicate: predicate.to_string(),
        enabled: true,
        created_date: chrono::NaiveDateTime::default(),
    };

    let rule = EscalationRule::try_from(row).expect("row should decode");

    assert_eq!(rule.id, 3);
    assert_eq!(rule.predicate.conditions.len(), 1);
    assert!(rule.enabled);
}

#[test]
fn escalation_rule_rejects_malformed_predicate() {
    let row = EscalationRuleRow {
        id: 4,
        tenant_id: 10,
        name: "broken".to_string(),
        predicate: "{".to_string(),
        enabled: true,
        created_date: chrono::NaiveDateTime::default(),
    };

    let error = EscalationRule::try_from(row).expect_err("bad JSON must fail");

    assert!(error.to_string().contains("predicate"));
}

#[test]
fn status_display_strings() {
    assert_eq!(DocumentStatus::Indexed.to_string(), "Indexed");
    assert_eq!(CuratedStatus::Active.to_string(), "Active");
}
