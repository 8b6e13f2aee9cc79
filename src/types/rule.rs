//! Layer matching rules.

use std::fmt;

use regex_lite::Regex;

/// Error compiling a layer rule.
#[derive(Debug, thiserror::Error)]
#[error("Invalid layer rule {pattern:?}: {source}")]
pub struct RuleError {
    /// Pattern as written in the rule set.
    pub pattern: String,
    /// Underlying regex error.
    #[source]
    pub source: regex_lite::Error,
}

/// Prefix-anchored regular expression matched against discovered layer names.
///
/// `lgt_` matches `lgt_key` but not `my_lgt_key`; the end is not anchored
/// unless the pattern says so.
#[derive(Debug, Clone)]
pub struct LayerRule {
    pattern: String,
    regex: Regex,
}

impl LayerRule {
    /// Compile a rule pattern.
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| RuleError {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Rule matching exactly one literal layer name.
    pub fn exact(layer: &str) -> Result<Self, RuleError> {
        Self::new(&format!("{}$", regex_lite::escape(layer)))
    }

    /// Pattern as written in the rule set.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the layer name matches from its first character.
    pub fn matches(&self, layer: &str) -> bool {
        self.regex.is_match(layer)
    }
}

impl PartialEq for LayerRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl fmt::Display for LayerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_anchored() {
        let rule = LayerRule::new("lgt_").unwrap();
        assert!(rule.matches("lgt_key"));
        assert!(!rule.matches("my_lgt_key"));
    }

    #[test]
    fn test_alternation_stays_anchored() {
        let rule = LayerRule::new("a|b").unwrap();
        assert!(rule.matches("b_layer"));
        assert!(!rule.matches("x_b"));
    }

    #[test]
    fn test_exact_rule_escapes() {
        let rule = LayerRule::exact("fx.smoke+1").unwrap();
        assert!(rule.matches("fx.smoke+1"));
        assert!(!rule.matches("fxXsmoke+1"));
        assert!(!rule.matches("fx.smoke+12"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = LayerRule::new("lgt_(").unwrap_err();
        assert_eq!(err.pattern, "lgt_(");
    }
}
