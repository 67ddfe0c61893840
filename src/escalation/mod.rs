// Escalation decision point
// Consumes the resolver's confidence signal through an EvaluationContext and
// reports which tenant rules fired. Dispatching to humans is the caller's job.

#[cfg(test)]
mod tests;

use serde::Serialize;
use tracing::debug;

use crate::rules::{Evaluation, EvaluationContext, RulePredicate, TraceEntry, evaluate};

/// A tenant-authored escalation rule, ready to evaluate
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationRule {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub predicate: RulePredicate,
    pub enabled: bool,
}

/// One rule that matched, with the full evaluation trace for operator debugging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredRule {
    pub rule_id: i64,
    pub rule_name: String,
    pub trace: Vec<TraceEntry>,
}

/// Outcome of evaluating every enabled rule against one context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    pub fired: Vec<FiredRule>,
}

/// Words too common to carry routing signal
const STOPWORDS: [&str; 12] = [
    "about", "have", "that", "this", "what", "when", "where", "which", "with", "your", "from",
    "does",
];

/// Extract candidate keywords from a message for keyword conditions.
///
/// Lowercased words of four letters or more, minus stopwords, in first-seen
/// order without duplicates.
#[inline]
pub fn extract_keywords(message: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for word in message.split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if cleaned.chars().count() < 4 || STOPWORDS.contains(&cleaned.as_str()) {
            continue;
        }
        if !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
    }

    keywords
}

/// Evaluate every enabled rule against the context.
///
/// All rules are evaluated even after the first match so the decision reports
/// the complete set of fired rules; integrations may route differently per rule.
#[inline]
pub fn decide(rules: &[EscalationRule], context: &EvaluationContext) -> EscalationDecision {
    let mut fired = Vec::new();

    for rule in rules {
        if !rule.enabled {
            debug!("Skipping disabled escalation rule {}", rule.id);
            continue;
        }

        let Evaluation { matched, trace } = evaluate(&rule.predicate, context);
        debug!(
            "Escalation rule {} ('{}') matched={}",
            rule.id, rule.name, matched
        );

        if matched {
            fired.push(FiredRule {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                trace,
            });
        }
    }

    EscalationDecision {
        should_escalate: !fired.is_empty(),
        fired,
    }
}
