// Escalation rule predicate model
// Predicates are authored by tenant operators in the dashboard and stored as JSON,
// so parsing and evaluation must tolerate shapes this build does not understand.


pub mod evaluator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub use evaluator::{Evaluation, TraceEntry, evaluate};

/// Dimension of the context a leaf condition tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Confidence,
    Keyword,
    EmailDomain,
    Time,
    SessionDuration,
    ConversationLength,
    Site,
    /// Catch-all for condition types authored against a newer schema.
    /// Evaluates to false instead of failing the whole rule.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ConditionKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ConditionKind::Confidence => write!(f, "confidence"),
            ConditionKind::Keyword => write!(f, "keyword"),
            ConditionKind::EmailDomain => write!(f, "email_domain"),
            ConditionKind::Time => write!(f, "time"),
            ConditionKind::SessionDuration => write!(f, "session_duration"),
            ConditionKind::ConversationLength => write!(f, "conversation_length"),
            ConditionKind::Site => write!(f, "site"),
            ConditionKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Comparison applied by a leaf condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Contains,
    NotContains,
    In,
    Between,
    /// Catch-all for operators authored against a newer schema
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ConditionOp {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ConditionOp::Lt => write!(f, "lt"),
            ConditionOp::Lte => write!(f, "lte"),
            ConditionOp::Gt => write!(f, "gt"),
            ConditionOp::Gte => write!(f, "gte"),
            ConditionOp::Eq => write!(f, "eq"),
            ConditionOp::Contains => write!(f, "contains"),
            ConditionOp::NotContains => write!(f, "not_contains"),
            ConditionOp::In => write!(f, "in"),
            ConditionOp::Between => write!(f, "between"),
            ConditionOp::Unknown => write!(f, "unknown"),
        }
    }
}

/// Leaf node of a predicate tree: one test against one dimension of the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub operator: ConditionOp,
    pub value: Value,
    /// Custom context field to test instead of the built-in dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Boolean connective of a branch node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

impl std::fmt::Display for BoolOp {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            BoolOp::And => write!(f, "and"),
            BoolOp::Or => write!(f, "or"),
        }
    }
}

/// Branch node of a predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePredicate {
    pub operator: BoolOp,
    pub conditions: Vec<RuleNode>,
}

/// A predicate tree node: either a nested predicate or a leaf condition.
///
/// Serialized untagged; a branch is recognized by its `conditions` array and
/// its `and`/`or` operator, everything else falls through to the leaf shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Predicate(RulePredicate),
    Condition(RuleCondition),
}

/// Runtime facts one evaluation runs against.
///
/// Current time is carried in `timestamp` rather than read from the clock so
/// evaluation stays a pure function of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    pub message: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
    pub user_email: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub site_id: Option<String>,
    pub session_duration_secs: Option<u64>,
    pub off_hours: Option<bool>,
    pub conversation_length: Option<u32>,
    pub custom: HashMap<String, Value>,
}

impl EvaluationContext {
    #[inline]
    pub fn new(message: impl Into<String>, confidence: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            confidence,
            keywords: Vec::new(),
            user_email: None,
            timestamp,
            site_id: None,
            session_duration_secs: None,
            off_hours: None,
            conversation_length: None,
            custom: HashMap::new(),
        }
    }

    #[inline]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    #[inline]
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    #[inline]
    pub fn with_site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    #[inline]
    pub fn with_session_duration(mut self, seconds: u64) -> Self {
        self.session_duration_secs = Some(seconds);
        self
    }

    #[inline]
    pub fn with_off_hours(mut self, off_hours: bool) -> Self {
        self.off_hours = Some(off_hours);
        self
    }

    #[inline]
    pub fn with_conversation_length(mut self, length: u32) -> Self {
        self.conversation_length = Some(length);
        self
    }
}
