//! Case-folding helpers shared by the content and selector matchers.

/// A string value with pre-computed lowercase for efficient case-insensitive matching.
///
/// Stubs are compiled once when they are registered, so the folded pattern is
/// computed once instead of on every delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    /// Original value (for case-sensitive matching)
    pub value: String,
    /// Pre-computed lowercase (for case-insensitive matching)
    pub lower: String,
}

impl CachedValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let lower = value.to_lowercase();
        Self { value, lower }
    }

    /// Check equality against a string value.
    #[inline]
    pub fn equals(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value == self.value
        } else {
            value.to_lowercase() == self.lower
        }
    }

    /// Check if a string value contains this pattern.
    #[inline]
    pub fn contained_in(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.contains(&self.value)
        } else {
            value.to_lowercase().contains(&self.lower)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals() {
        let v = CachedValue::new("Orders");
        assert!(v.equals("Orders", true));
        assert!(!v.equals("orders", true));
        assert!(v.equals("ORDERS", false));
    }

    #[test]
    fn test_contained_in() {
        let v = CachedValue::new("abc");
        assert!(v.contained_in("XABCX", false));
        assert!(!v.contained_in("XABCX", true));
        assert!(v.contained_in("xabcx", true));
    }
}
