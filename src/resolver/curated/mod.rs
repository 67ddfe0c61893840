// Curated answer matching
// Cheap, exact, operator-controlled answers for common questions; the vector
// corpus covers the long tail.

#[cfg(test)]
mod tests;

use itertools::Itertools;
use tracing::debug;

use crate::database::sqlite::models::{CuratedAnswer, CuratedStatus};

/// A question/query containment shorter than this is too weak a signal to
/// count as a match
const MIN_QUESTION_OVERLAP_CHARS: usize = 8;

/// A curated answer that matched the query, with the evidence for the match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratedMatch {
    pub answer: CuratedAnswer,
    /// Keywords of the answer found in the query, lowercased
    pub matched_keywords: Vec<String>,
    /// Whether the query and the stored question overlapped as substrings
    pub question_match: bool,
}

/// Match and rank curated answers against a query.
///
/// An answer matches when any of its keywords appears in the query, or when
/// the normalized query and question contain one another (in either
/// direction, so both "refunds?" against a longer stored question and a long
/// query against a short stored question work). Ranking is priority first,
/// then match specificity, then creation order; the whole pipeline is
/// deterministic for identical inputs.
#[inline]
pub fn rank_matches(query: &str, answers: Vec<CuratedAnswer>) -> Vec<CuratedMatch> {
    let normalized_query = normalize(query);
    if normalized_query.is_empty() {
        return Vec::new();
    }

    let matches: Vec<CuratedMatch> = answers
        .into_iter()
        // The store already filters, but resolution must never surface a
        // disabled answer even if handed one
        .filter(|answer| answer.status == CuratedStatus::Active)
        .filter_map(|answer| match_answer(&normalized_query, answer))
        .sorted_by(|a, b| {
            b.answer
                .priority
                .cmp(&a.answer.priority)
                .then_with(|| b.matched_keywords.len().cmp(&a.matched_keywords.len()))
                .then_with(|| a.answer.id.cmp(&b.answer.id))
        })
        .collect();

    debug!(
        "Curated matching produced {} candidates for query '{}'",
        matches.len(),
        query
    );

    matches
}

fn match_answer(normalized_query: &str, answer: CuratedAnswer) -> Option<CuratedMatch> {
    let matched_keywords: Vec<String> = answer
        .keywords
        .iter()
        .map(|keyword| normalize(keyword))
        .filter(|keyword| !keyword.is_empty() && normalized_query.contains(keyword.as_str()))
        .collect();

    let question_match = question_overlaps(normalized_query, &normalize(&answer.question));

    if matched_keywords.is_empty() && !question_match {
        return None;
    }

    Some(CuratedMatch {
        answer,
        matched_keywords,
        question_match,
    })
}

/// Bidirectional containment with a minimum-length guard so one-word
/// containment does not count
fn question_overlaps(query: &str, question: &str) -> bool {
    if question.is_empty() {
        return false;
    }

    let shorter = query.chars().count().min(question.chars().count());
    if shorter < MIN_QUESTION_OVERLAP_CHARS {
        return false;
    }

    query.contains(question) || question.contains(query)
}

/// Lowercase and collapse runs of whitespace; punctuation is kept so keyword
/// phrases like "sign-in" still match literally
fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().join(" ")
}
