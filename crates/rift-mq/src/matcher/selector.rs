//! Property selector subset.
//!
//! Only two forms are understood:
//! - `key=value`: the property `key` must equal `value` (quotes stripped)
//! - anything else: some property value must fully match the selector as a
//!   case-insensitive regular expression
//!
//! This is not a JMS selector grammar; boolean operators are not evaluated.

use super::content::compile_full_match;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum CompiledSelector {
    /// No selector, or a blank one
    Any,
    PropertyEquals { name: String, value: String },
    /// `None` when the selector is not a valid pattern; never matches
    Pattern {
        source: String,
        regex: Option<Arc<Regex>>,
    },
}

impl CompiledSelector {
    pub fn compile(selector: Option<&str>) -> Self {
        let selector = match selector {
            Some(s) if !s.trim().is_empty() => s,
            _ => return CompiledSelector::Any,
        };

        if let Some((name, value)) = selector.split_once('=') {
            return CompiledSelector::PropertyEquals {
                name: name.trim().to_string(),
                value: value.trim().replace(['\'', '"'], ""),
            };
        }

        let regex = match compile_full_match(selector, true) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(e) => {
                warn!("Error evaluating selector '{}': {}", selector, e);
                None
            }
        };
        CompiledSelector::Pattern {
            source: selector.to_string(),
            regex,
        }
    }

    pub fn matches(&self, properties: &HashMap<String, String>) -> bool {
        match self {
            CompiledSelector::Any => true,
            CompiledSelector::PropertyEquals { name, value } => {
                properties.get(name).is_some_and(|actual| actual == value)
            }
            CompiledSelector::Pattern { regex, .. } => match regex {
                Some(regex) => properties.values().any(|v| regex.is_match(v)),
                None => false,
            },
        }
    }
}
