//! Body predicate compilation and evaluation.

use super::cached::CachedValue;
use crate::stub::{ContentMatch, ContentMatchType};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::warn;

/// Compiled body predicate
#[derive(Debug, Clone)]
pub enum CompiledContentMatch {
    /// NONE, or an empty pattern
    Any,
    Contains {
        pattern: CachedValue,
        case_sensitive: bool,
    },
    Exact {
        pattern: CachedValue,
        case_sensitive: bool,
    },
    /// Anchored for full-match semantics
    Regex(Arc<Regex>),
    /// Pattern failed to compile; never matches
    Invalid { pattern: String, error: String },
}

impl CompiledContentMatch {
    pub fn compile(content_match: &ContentMatch) -> Self {
        if content_match.match_type == ContentMatchType::None || content_match.pattern.is_empty() {
            return CompiledContentMatch::Any;
        }

        let case_sensitive = content_match.case_sensitive;
        let pattern = &content_match.pattern;
        match content_match.match_type {
            ContentMatchType::None => CompiledContentMatch::Any,
            ContentMatchType::Contains => CompiledContentMatch::Contains {
                pattern: CachedValue::new(pattern.as_str()),
                case_sensitive,
            },
            ContentMatchType::Exact => CompiledContentMatch::Exact {
                pattern: CachedValue::new(pattern.as_str()),
                case_sensitive,
            },
            ContentMatchType::Regex => match compile_full_match(pattern, !case_sensitive) {
                Ok(regex) => CompiledContentMatch::Regex(Arc::new(regex)),
                Err(e) => {
                    warn!("Invalid regex pattern '{}': {}", pattern, e);
                    CompiledContentMatch::Invalid {
                        pattern: pattern.clone(),
                        error: e.to_string(),
                    }
                }
            },
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        match self {
            CompiledContentMatch::Any => true,
            CompiledContentMatch::Contains {
                pattern,
                case_sensitive,
            } => pattern.contained_in(content, *case_sensitive),
            CompiledContentMatch::Exact {
                pattern,
                case_sensitive,
            } => pattern.equals(content, *case_sensitive),
            CompiledContentMatch::Regex(regex) => regex.is_match(content),
            CompiledContentMatch::Invalid { .. } => false,
        }
    }
}

/// Compile `pattern` so that it must match the whole input.
///
/// The pattern is validated on its own first: an unbalanced group such as
/// `a)|(b` would otherwise become a valid alternation once wrapped.
pub fn compile_full_match(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).build()?;
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
}
