// Pure predicate evaluation. No clock reads, no storage, no network: everything
// the rule can see arrives through the EvaluationContext.


use chrono::Timelike;
use serde::Serialize;
use serde_json::Value;

use super::{BoolOp, ConditionKind, ConditionOp, EvaluationContext, RuleCondition, RuleNode, RulePredicate};

/// Business hours used when the context does not carry an explicit off-hours flag
const BUSINESS_HOURS_START: u32 = 9;
const BUSINESS_HOURS_END: u32 = 17;

/// One evaluated node, in evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Nesting depth, 0 for the root predicate
    pub depth: usize,
    pub matched: bool,
    pub detail: String,
}

/// Result of evaluating one predicate tree against one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub matched: bool,
    pub trace: Vec<TraceEntry>,
}

/// Evaluate a predicate tree against a context.
///
/// Every node is evaluated (no short-circuiting) so the trace always reports
/// the logical outcome of the entire tree, which is what operators need when
/// debugging why a rule fired. A predicate with no conditions matches nothing.
#[inline]
pub fn evaluate(predicate: &RulePredicate, context: &EvaluationContext) -> Evaluation {
    let mut trace = Vec::new();
    let matched = eval_predicate(predicate, context, 0, &mut trace);
    Evaluation { matched, trace }
}

fn eval_predicate(
    predicate: &RulePredicate,
    context: &EvaluationContext,
    depth: usize,
    trace: &mut Vec<TraceEntry>,
) -> bool {
    if predicate.conditions.is_empty() {
        trace.push(TraceEntry {
            depth,
            matched: false,
            detail: format!("{} with no conditions matches nothing", predicate.operator),
        });
        return false;
    }

    // Reserve the branch entry up front so it precedes its children in the trace
    let header_index = trace.len();
    trace.push(TraceEntry {
        depth,
        matched: false,
        detail: String::new(),
    });

    let mut met = 0_usize;
    let total = predicate.conditions.len();
    for node in &predicate.conditions {
        let child_matched = match node {
            RuleNode::Predicate(inner) => eval_predicate(inner, context, depth + 1, trace),
            RuleNode::Condition(condition) => {
                let (matched, detail) = eval_condition(condition, context);
                trace.push(TraceEntry {
                    depth: depth + 1,
                    matched,
                    detail,
                });
                matched
            }
        };
        if child_matched {
            met += 1;
        }
    }

    let matched = match predicate.operator {
        BoolOp::And => met == total,
        BoolOp::Or => met > 0,
    };

    trace[header_index] = TraceEntry {
        depth,
        matched,
        detail: format!("{}: {} of {} conditions met", predicate.operator, met, total),
    };

    matched
}

/// Evaluate one leaf. Malformed conditions resolve to false with an
/// explanatory detail rather than an error: rules are end-user-authored and a
/// single bad leaf must not take down the whole evaluation.
fn eval_condition(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    if let Some(field) = condition.field.as_deref() {
        return eval_custom_field(condition, context, field);
    }

    match condition.kind {
        ConditionKind::Confidence => eval_confidence(condition, context),
        ConditionKind::Keyword => eval_keyword(condition, context),
        ConditionKind::EmailDomain => eval_email_domain(condition, context),
        ConditionKind::Time => eval_time(condition, context),
        ConditionKind::SessionDuration => eval_session_duration(condition, context),
        ConditionKind::ConversationLength => eval_conversation_length(condition, context),
        ConditionKind::Site => eval_site(condition, context),
        ConditionKind::Unknown => (
            false,
            "condition type is not supported by this version".to_string(),
        ),
    }
}

fn eval_confidence(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let Some(threshold) = condition.value.as_f64() else {
        return (false, "confidence threshold must be a number".to_string());
    };

    let Some((matched, symbol)) = compare_f64(context.confidence, threshold, condition.operator)
    else {
        return (false, unsupported(condition));
    };

    (
        matched,
        describe_compare("confidence", context.confidence, symbol, threshold, matched),
    )
}

fn eval_keyword(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let message = context.message.to_lowercase();
    let keywords: Vec<String> = context.keywords.iter().map(|k| k.to_lowercase()).collect();
    let present = |needle: &str| message.contains(needle) || keywords.iter().any(|k| k == needle);

    match condition.operator {
        ConditionOp::Contains => {
            let Some(needle) = string_value(&condition.value) else {
                return (false, "keyword value must be a string".to_string());
            };
            let matched = present(&needle);
            (
                matched,
                format!(
                    "keyword '{}' {} in message",
                    needle,
                    if matched { "found" } else { "not found" }
                ),
            )
        }
        ConditionOp::NotContains => {
            let Some(needle) = string_value(&condition.value) else {
                return (false, "keyword value must be a string".to_string());
            };
            let matched = !present(&needle);
            (
                matched,
                format!(
                    "keyword '{}' {} from message",
                    needle,
                    if matched { "absent" } else { "not absent" }
                ),
            )
        }
        ConditionOp::In => {
            let Some(needles) = string_list_value(&condition.value) else {
                return (false, "keyword set must be an array of strings".to_string());
            };
            let hits: Vec<&String> = needles.iter().filter(|n| present(n.as_str())).collect();
            let matched = !hits.is_empty();
            let detail = if matched {
                format!(
                    "keywords [{}] found in message",
                    hits.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(", ")
                )
            } else {
                format!("none of {} keywords found in message", needles.len())
            };
            (matched, detail)
        }
        _ => (false, unsupported(condition)),
    }
}

fn eval_email_domain(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let Some(email) = context.user_email.as_deref() else {
        return (false, "no user email in context".to_string());
    };
    let Some(domain) = email.rsplit_once('@').map(|(_, d)| d.to_lowercase()) else {
        return (false, format!("user email '{}' has no domain", email));
    };

    match condition.operator {
        ConditionOp::Eq => {
            let Some(expected) = string_value(&condition.value) else {
                return (false, "email domain value must be a string".to_string());
            };
            let matched = domain == expected;
            (
                matched,
                format!(
                    "email domain '{}' {} '{}'",
                    domain,
                    if matched { "equals" } else { "does not equal" },
                    expected
                ),
            )
        }
        ConditionOp::Contains => {
            let Some(fragment) = string_value(&condition.value) else {
                return (false, "email domain value must be a string".to_string());
            };
            let matched = domain.contains(&fragment);
            (
                matched,
                format!(
                    "email domain '{}' {} '{}'",
                    domain,
                    if matched { "contains" } else { "does not contain" },
                    fragment
                ),
            )
        }
        ConditionOp::In => {
            let Some(expected) = string_list_value(&condition.value) else {
                return (false, "email domain set must be an array of strings".to_string());
            };
            let matched = expected.iter().any(|d| *d == domain);
            (
                matched,
                format!(
                    "email domain '{}' {} the allowed set",
                    domain,
                    if matched { "is in" } else { "is not in" }
                ),
            )
        }
        _ => (false, unsupported(condition)),
    }
}

fn eval_time(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let hour = context.timestamp.hour();

    match condition.operator {
        ConditionOp::Eq => {
            let Some(period) = condition.value.as_str() else {
                return (
                    false,
                    "time eq value must be 'business_hours' or 'off_hours'".to_string(),
                );
            };
            // An explicit flag from the session wins over the derived hour
            let in_business_hours = context
                .off_hours
                .map_or_else(|| (BUSINESS_HOURS_START..BUSINESS_HOURS_END).contains(&hour), |off| !off);
            match period {
                "business_hours" => (
                    in_business_hours,
                    format!(
                        "hour of day ({}) is {}business hours",
                        hour,
                        if in_business_hours { "within " } else { "outside " }
                    ),
                ),
                "off_hours" => (
                    !in_business_hours,
                    format!(
                        "hour of day ({}) is {}off hours",
                        hour,
                        if in_business_hours { "not " } else { "" }
                    ),
                ),
                other => (
                    false,
                    format!("time period '{}' is not recognized", other),
                ),
            }
        }
        ConditionOp::Between => {
            let Some((low, high)) = hour_pair_value(&condition.value) else {
                return (
                    false,
                    "time between value must be a [low, high) pair of hours".to_string(),
                );
            };
            let matched = hour >= low && hour < high;
            (
                matched,
                format!(
                    "hour of day ({}) {} [{}, {})",
                    hour,
                    if matched { "within" } else { "outside" },
                    low,
                    high
                ),
            )
        }
        ConditionOp::Lt | ConditionOp::Gt => {
            let Some(bound) = condition.value.as_u64().and_then(|b| u32::try_from(b).ok()) else {
                return (false, "time bound must be an hour number".to_string());
            };
            let (matched, symbol) = match condition.operator {
                ConditionOp::Lt => (hour < bound, "<"),
                _ => (hour > bound, ">"),
            };
            (
                matched,
                format!(
                    "hour of day ({}) {} {} {}",
                    hour,
                    if matched { "is" } else { "is not" },
                    symbol,
                    bound
                ),
            )
        }
        _ => (false, unsupported(condition)),
    }
}

fn eval_session_duration(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let Some(threshold) = condition.value.as_f64() else {
        return (false, "session duration threshold must be a number".to_string());
    };
    let seconds = context.session_duration_secs.unwrap_or(0) as f64;

    match condition.operator {
        ConditionOp::Lt | ConditionOp::Lte | ConditionOp::Gt | ConditionOp::Gte => {
            let Some((matched, symbol)) = compare_f64(seconds, threshold, condition.operator) else {
                return (false, unsupported(condition));
            };
            (
                matched,
                describe_compare("session duration", seconds, symbol, threshold, matched),
            )
        }
        _ => (false, unsupported(condition)),
    }
}

fn eval_conversation_length(
    condition: &RuleCondition,
    context: &EvaluationContext,
) -> (bool, String) {
    let Some(threshold) = condition.value.as_f64() else {
        return (
            false,
            "conversation length threshold must be a number".to_string(),
        );
    };
    let length = f64::from(context.conversation_length.unwrap_or(1));

    let Some((matched, symbol)) = compare_f64(length, threshold, condition.operator) else {
        return (false, unsupported(condition));
    };

    (
        matched,
        describe_compare("conversation length", length, symbol, threshold, matched),
    )
}

fn eval_site(condition: &RuleCondition, context: &EvaluationContext) -> (bool, String) {
    let Some(site_id) = context.site_id.as_deref() else {
        return (false, "no site in context".to_string());
    };

    match condition.operator {
        ConditionOp::Eq => {
            let Some(expected) = condition.value.as_str() else {
                return (false, "site value must be a string".to_string());
            };
            let matched = site_id == expected;
            (
                matched,
                format!(
                    "site '{}' {} '{}'",
                    site_id,
                    if matched { "equals" } else { "does not equal" },
                    expected
                ),
            )
        }
        ConditionOp::In => {
            let Some(expected) = string_list_value(&condition.value) else {
                return (false, "site set must be an array of strings".to_string());
            };
            let matched = expected.iter().any(|s| s == site_id);
            (
                matched,
                format!(
                    "site '{}' {} the allowed set",
                    site_id,
                    if matched { "is in" } else { "is not in" }
                ),
            )
        }
        _ => (false, unsupported(condition)),
    }
}

/// Conditions addressing a named custom field compare against
/// `context.custom`, with the operator applied to the JSON value directly.
fn eval_custom_field(
    condition: &RuleCondition,
    context: &EvaluationContext,
    field: &str,
) -> (bool, String) {
    let Some(actual) = context.custom.get(field) else {
        return (false, format!("custom field '{}' not present in context", field));
    };

    match condition.operator {
        ConditionOp::Eq => {
            let matched = actual == &condition.value;
            (
                matched,
                format!(
                    "custom field '{}' {} expected value",
                    field,
                    if matched { "equals" } else { "does not equal" }
                ),
            )
        }
        ConditionOp::Contains => {
            let (Some(haystack), Some(needle)) =
                (actual.as_str(), condition.value.as_str())
            else {
                return (
                    false,
                    format!("custom field '{}' contains requires string values", field),
                );
            };
            let matched = haystack.to_lowercase().contains(&needle.to_lowercase());
            (
                matched,
                format!(
                    "custom field '{}' {} '{}'",
                    field,
                    if matched { "contains" } else { "does not contain" },
                    needle
                ),
            )
        }
        ConditionOp::In => {
            let Some(allowed) = condition.value.as_array() else {
                return (false, format!("custom field '{}' in requires an array", field));
            };
            let matched = allowed.contains(actual);
            (
                matched,
                format!(
                    "custom field '{}' {} the allowed set",
                    field,
                    if matched { "is in" } else { "is not in" }
                ),
            )
        }
        ConditionOp::Lt | ConditionOp::Lte | ConditionOp::Gt | ConditionOp::Gte => {
            let (Some(lhs), Some(rhs)) = (actual.as_f64(), condition.value.as_f64()) else {
                return (
                    false,
                    format!("custom field '{}' comparison requires numbers", field),
                );
            };
            let Some((matched, symbol)) = compare_f64(lhs, rhs, condition.operator) else {
                return (false, unsupported(condition));
            };
            (
                matched,
                describe_compare(&format!("custom field '{}'", field), lhs, symbol, rhs, matched),
            )
        }
        _ => (false, unsupported(condition)),
    }
}

fn compare_f64(lhs: f64, rhs: f64, operator: ConditionOp) -> Option<(bool, &'static str)> {
    match operator {
        ConditionOp::Lt => Some((lhs < rhs, "<")),
        ConditionOp::Lte => Some((lhs <= rhs, "<=")),
        ConditionOp::Gt => Some((lhs > rhs, ">")),
        ConditionOp::Gte => Some((lhs >= rhs, ">=")),
        ConditionOp::Eq => Some(((lhs - rhs).abs() < f64::EPSILON, "=")),
        _ => None,
    }
}

fn describe_compare(subject: &str, lhs: f64, symbol: &str, rhs: f64, matched: bool) -> String {
    if matched {
        format!("{} ({}) {} {}", subject, lhs, symbol, rhs)
    } else {
        format!("{} ({}) is not {} {}", subject, lhs, symbol, rhs)
    }
}

fn unsupported(condition: &RuleCondition) -> String {
    format!(
        "operator '{}' is not supported for {} conditions",
        condition.operator, condition.kind
    )
}

fn string_value(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_lowercase())
}

fn string_list_value(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| item.as_str().map(|s| s.to_lowercase()))
        .collect()
}

fn hour_pair_value(value: &Value) -> Option<(u32, u32)> {
    let pair = value.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let low = pair[0].as_u64().and_then(|h| u32::try_from(h).ok())?;
    let high = pair[1].as_u64().and_then(|h| u32::try_from(h).ok())?;
    if low > high {
        return None;
    }
    Some((low, high))
}
