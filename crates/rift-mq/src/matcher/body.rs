//! Structured body criteria (JSONPath / XPath extraction plus a comparison).
//!
//! Every criterion of a stub must pass. A value that cannot be extracted
//! (unparseable body, missing node, JSON null) fails the criterion.

use super::content::compile_full_match;
use crate::stub::{BodyExpressionType, BodyMatchCriterion, BodyOperator};
use regex::Regex;
use serde_json_path::JsonPath;
use std::sync::Arc;
use tracing::{trace, warn};

/// Comparison applied to an extracted value. Always case sensitive.
#[derive(Debug, Clone)]
pub enum ValueCheck {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// Anchored for full-match semantics
    Regex(Arc<Regex>),
}

impl ValueCheck {
    fn compile(operator: BodyOperator, value: &str) -> Result<Self, regex::Error> {
        Ok(match operator {
            BodyOperator::Equals => ValueCheck::Equals(value.to_string()),
            BodyOperator::Contains => ValueCheck::Contains(value.to_string()),
            BodyOperator::StartsWith => ValueCheck::StartsWith(value.to_string()),
            BodyOperator::EndsWith => ValueCheck::EndsWith(value.to_string()),
            BodyOperator::Regex => ValueCheck::Regex(Arc::new(compile_full_match(value, false)?)),
        })
    }

    pub fn matches(&self, actual: &str) -> bool {
        match self {
            ValueCheck::Equals(expected) => actual == expected,
            ValueCheck::Contains(expected) => actual.contains(expected.as_str()),
            ValueCheck::StartsWith(expected) => actual.starts_with(expected.as_str()),
            ValueCheck::EndsWith(expected) => actual.ends_with(expected.as_str()),
            ValueCheck::Regex(regex) => regex.is_match(actual),
        }
    }
}

/// One compiled body criterion
#[derive(Debug, Clone)]
pub enum CompiledBodyCriterion {
    JsonPath {
        path: Arc<JsonPath>,
        check: ValueCheck,
    },
    /// XPath is evaluated per message against a freshly parsed document
    XPath { expression: String, check: ValueCheck },
    /// Expression or regex failed to compile; never matches
    Invalid { expression: String, error: String },
}

impl CompiledBodyCriterion {
    pub fn compile(criterion: &BodyMatchCriterion) -> Self {
        let invalid = |error: String| {
            warn!("Invalid body criterion '{}': {}", criterion.expression, error);
            CompiledBodyCriterion::Invalid {
                expression: criterion.expression.clone(),
                error,
            }
        };

        let check = match ValueCheck::compile(criterion.operator, &criterion.value) {
            Ok(check) => check,
            Err(e) => return invalid(e.to_string()),
        };

        match criterion.kind {
            BodyExpressionType::JsonPath => match JsonPath::parse(&criterion.expression) {
                Ok(path) => CompiledBodyCriterion::JsonPath {
                    path: Arc::new(path),
                    check,
                },
                Err(e) => invalid(e.to_string()),
            },
            BodyExpressionType::XPath => {
                if criterion.expression.trim().is_empty() {
                    return invalid("empty XPath expression".to_string());
                }
                CompiledBodyCriterion::XPath {
                    expression: criterion.expression.clone(),
                    check,
                }
            }
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        let (extracted, check) = match self {
            CompiledBodyCriterion::JsonPath { path, check } => {
                (extract_json_path(content, path), check)
            }
            CompiledBodyCriterion::XPath { expression, check } => {
                (extract_xpath(content, expression), check)
            }
            CompiledBodyCriterion::Invalid { .. } => return false,
        };
        match extracted {
            Some(value) => check.matches(&value),
            None => {
                trace!("Body criterion extracted no value");
                false
            }
        }
    }
}

/// First node selected by `path`, rendered as text. Strings are returned raw;
/// null and missing nodes yield `None`.
pub fn extract_json_path(body: &str, path: &JsonPath) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    match path.query(&json).first()? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Evaluate `path` against an XML body.
///
/// Node sets yield the string value of their first node; an empty node set
/// yields `None`.
pub fn extract_xpath(body: &str, path: &str) -> Option<String> {
    use sxd_document::parser;
    use sxd_xpath::{evaluate_xpath, Value};

    let package = parser::parse(body).ok()?;
    let document = package.as_document();

    match evaluate_xpath(&document, path).ok()? {
        Value::String(s) => Some(s),
        Value::Number(n) => {
            if n.fract() == 0.0 {
                Some(format!("{}", n as i64))
            } else {
                Some(n.to_string())
            }
        }
        Value::Boolean(b) => Some(b.to_string()),
        Value::Nodeset(nodes) => nodes.document_order_first().map(|node| node.string_value()),
    }
}
