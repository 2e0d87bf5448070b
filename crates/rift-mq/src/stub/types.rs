//! Type definitions for broker stubs.
//!
//! A stub is a declarative request -> response rule bound to one queue or topic.
//! Field naming follows the management API (camelCase JSON).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Destination Types
// ============================================================================

/// Kind of broker destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DestinationType {
    #[default]
    #[serde(alias = "queue", alias = "Queue")]
    Queue,
    #[serde(alias = "topic", alias = "Topic")]
    Topic,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Queue => "queue",
            DestinationType::Topic => "topic",
        }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, DestinationType::Topic)
    }
}

/// An addressable queue or topic on the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "type", default)]
    pub kind: DestinationType,
    pub name: String,
}

impl Destination {
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            kind: DestinationType::Queue,
            name: name.into(),
        }
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            kind: DestinationType::Topic,
            name: name.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind.as_str(), self.name)
    }
}

// ============================================================================
// Matching Types
// ============================================================================

/// How the message body is compared against the stub pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentMatchType {
    #[default]
    None,
    Contains,
    Exact,
    Regex,
}

/// Body predicate of a stub
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMatch {
    #[serde(rename = "type", default)]
    pub match_type: ContentMatchType,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ContentMatch {
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self {
            match_type: ContentMatchType::Contains,
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn exact(pattern: impl Into<String>) -> Self {
        Self {
            match_type: ContentMatchType::Exact,
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            match_type: ContentMatchType::Regex,
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

/// Expression language of a body criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyExpressionType {
    #[serde(rename = "xpath", alias = "XPATH", alias = "xPath")]
    XPath,
    #[serde(rename = "jsonpath", alias = "JSONPATH", alias = "jsonPath")]
    JsonPath,
}

/// Comparison applied to the value a criterion extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyOperator {
    #[default]
    Equals,
    Contains,
    #[serde(alias = "startswith")]
    StartsWith,
    #[serde(alias = "endswith")]
    EndsWith,
    /// Full match, case sensitive
    Regex,
}

/// Structured body predicate: extract a value with an XPath or JSONPath
/// expression, then compare it. All criteria of a stub must pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyMatchCriterion {
    #[serde(rename = "type")]
    pub kind: BodyExpressionType,
    pub expression: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operator: BodyOperator,
}

impl BodyMatchCriterion {
    pub fn json_path(
        expression: impl Into<String>,
        operator: BodyOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: BodyExpressionType::JsonPath,
            expression: expression.into(),
            value: value.into(),
            operator,
        }
    }

    pub fn xpath(
        expression: impl Into<String>,
        operator: BodyOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: BodyExpressionType::XPath,
            expression: expression.into(),
            value: value.into(),
            operator,
        }
    }
}

// ============================================================================
// Stub Types
// ============================================================================

/// Lifecycle status of a stub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StubStatus {
    Active,
    #[default]
    Inactive,
}

impl StubStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, StubStatus::Active)
    }

    pub fn toggled(&self) -> Self {
        match self {
            StubStatus::Active => StubStatus::Inactive,
            StubStatus::Inactive => StubStatus::Active,
        }
    }
}

/// Reply definition of a stub
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubResponse {
    /// Where to send the reply. Falls back to the inbound reply-to when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    /// Payload template (supports `${message.*}` and `${stub.*}` variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Artificial latency in milliseconds
    #[serde(default, rename = "latency")]
    pub latency_ms: u64,
    /// Optional webhook whose response body becomes the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Stub definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubRecord {
    /// Opaque identifier. Assigned on create when empty.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub destination: Destination,
    /// Coarse property filter: `key=value` or a pattern over all property values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub content_match: ContentMatch,
    /// Structured body predicates, all of which must pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_match_criteria: Vec<BodyMatchCriterion>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub response: StubResponse,
    #[serde(default)]
    pub status: StubStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StubRecord {
    /// Create an inactive stub with no predicates and an empty response
    pub fn new(id: impl Into<String>, destination: Destination) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: None,
            description: None,
            user_id: None,
            destination,
            selector: None,
            content_match: ContentMatch::default(),
            body_match_criteria: Vec::new(),
            priority: 0,
            response: StubResponse::default(),
            status: StubStatus::Inactive,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_content_match(mut self, content_match: ContentMatch) -> Self {
        self.content_match = content_match;
        self
    }

    pub fn with_body_criterion(mut self, criterion: BodyMatchCriterion) -> Self {
        self.body_match_criteria.push(criterion);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.response.payload = Some(payload.into());
        self
    }

    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.response.destination = Some(destination);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.response.latency_ms = latency_ms;
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.response.webhook_url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: StubStatus) -> Self {
        self.status = status;
        self
    }

    pub fn active(self) -> Self {
        self.with_status(StubStatus::Active)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Display label used in log records
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Stub management errors
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("Stub not found with id: {0}")]
    NotFound(String),
    #[error("Stub already exists with id: {0}")]
    AlreadyExists(String),
    #[error(
        "Cannot create stub with priority {priority}. A stub with higher priority ({existing_priority}) already exists: {existing}"
    )]
    PriorityConflict {
        priority: i32,
        existing_priority: i32,
        existing: String,
    },
    #[error("Invalid stub: {0}")]
    Validation(String),
}
