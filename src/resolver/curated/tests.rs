use super::*;

fn answer(id: i64, question: &str, priority: i64, keywords: &[&str]) -> CuratedAnswer {
    CuratedAnswer {
        id,
        tenant_id: 1,
        site_id: None,
        question: question.to_string(),
        answer: format!("Answer for: {}", question),
        priority,
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        tags: Vec::new(),
        status: CuratedStatus::Active,
        created_date: chrono::NaiveDateTime::default(),
    }
}

#[test]
fn keyword_hit_matches() {
    let answers = vec![answer(1, "How do refunds work?", 0, &["refund"])];

    let matches = rank_matches("I want a refund for my order", answers);

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_keywords, vec!["refund"]);
}

#[test]
fn keyword_matching_is_case_insensitive() {
    let answers = vec![answer(1, "Billing", 0, &["Invoice"])];

    let matches = rank_matches("where is my INVOICE", answers);

    assert_eq!(matches.len(), 1);
}

#[test]
fn question_containment_matches_both_directions() {
    // Query contained by the stored question
    let contained = rank_matches(
        "reset my password",
        vec![answer(1, "How do I reset my password?", 0, &[])],
    );
    assert_eq!(contained.len(), 1);
    assert!(contained[0].question_match);

    // Stored question contained by the query
    let containing = rank_matches(
        "please help me reset my password",
        vec![answer(2, "reset my password", 0, &[])],
    );
    assert_eq!(containing.len(), 1);
    assert!(containing[0].question_match);
}

#[test]
fn short_overlap_does_not_match() {
    let answers = vec![answer(1, "API", 0, &[])];

    let matches = rank_matches("API", answers);

    assert!(matches.is_empty(), "three characters is not enough signal");
}

#[test]
fn unrelated_query_matches_nothing() {
    let answers = vec![answer(1, "How do refunds work?", 10, &["refund", "money back"])];

    let matches = rank_matches("how do I invite a teammate", answers);

    assert!(matches.is_empty());
}

#[test]
fn higher_priority_wins() {
    let answers = vec![
        answer(1, "How do refunds work?", 5, &["refund"]),
        answer(2, "Refund policy details", 10, &["refund"]),
    ];

    let matches = rank_matches("what is your refund policy", answers);

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].answer.id, 2);
    assert_eq!(matches[1].answer.id, 1);
}

#[test]
fn specificity_breaks_priority_ties() {
    let answers = vec![
        answer(1, "Billing", 5, &["billing"]),
        answer(2, "Billing and invoices", 5, &["billing", "invoice"]),
    ];

    let matches = rank_matches("a billing question about an invoice", answers);

    assert_eq!(matches[0].answer.id, 2, "two keyword hits beat one");
}

#[test]
fn creation_order_breaks_remaining_ties() {
    let answers = vec![
        answer(2, "Second answer about exports", 5, &["export"]),
        answer(1, "First answer about exports", 5, &["export"]),
    ];

    let matches = rank_matches("how does export work", answers);

    assert_eq!(matches[0].answer.id, 1, "older answer wins the tie");
}

#[test]
fn inactive_answers_never_match() {
    let mut inactive = answer(1, "How do refunds work?", 10, &["refund"]);
    inactive.status = CuratedStatus::Inactive;

    let matches = rank_matches("refund please", vec![inactive]);

    assert!(matches.is_empty());
}

#[test]
fn ranking_is_deterministic() {
    let answers = || {
        vec![
            answer(3, "Refund policy", 5, &["refund"]),
            answer(1, "Refunds explained", 5, &["refund"]),
            answer(2, "Money back", 5, &["refund"]),
        ]
    };

    let first = rank_matches("refund", answers());
    let second = rank_matches("refund", answers());

    let ids = |ms: &[CuratedMatch]| ms.iter().map(|m| m.answer.id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), vec![1, 2, 3]);
}

#[test]
fn whitespace_is_collapsed_before_matching() {
    let answers = vec![answer(1, "How   do refunds\nwork?", 0, &[])];

    let matches = rank_matches("how do refunds work?", answers);

    assert_eq!(matches.len(), 1);
    assert!(matches[0].question_match);
}
