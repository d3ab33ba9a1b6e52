//! Access token scope (RFC 6749 §3.3).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An unordered set of scope-values.
///
/// Every member is a non-empty string without spaces. The textual form joins
/// the members with single spaces; an empty scope is the empty string. There
/// is no distinction between "no scope" and "empty scope".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Scope(BTreeSet<String>);

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a space-delimited scope string. Empty segments are ignored, so
    /// leading, trailing and repeated spaces are accepted. No case folding.
    pub fn parse(input: &str) -> Self {
        Self(
            input
                .split(' ')
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Adds the scope-values found in `value`. Since a scope-value cannot
    /// contain a space, a string with spaces contributes each of its segments.
    pub fn insert(&mut self, value: &str) {
        self.0.extend(
            value
                .split(' ')
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
        );
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns true when every value of `self` is also in `other`.
    pub fn is_subset(&self, other: &Scope) -> bool {
        self.0.is_subset(&other.0)
    }

    /// The values of `self` missing from `granted`.
    pub fn missing_from<'a>(&'a self, granted: &'a Scope) -> impl Iterator<Item = &'a str> {
        self.0.difference(&granted.0).map(String::as_str)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(value)?;
        }
        Ok(())
    }
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Scope::parse(s))
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Scope::parse(&value)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Scope::parse(value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Scope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut scope = Scope::new();
        for value in iter {
            scope.insert(value.as_ref());
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_empty_segments() {
        let scope = Scope::parse("  read   write ");
        assert_eq!(scope.len(), 2);
        assert!(scope.contains("read"));
        assert!(scope.contains("write"));
    }

    #[test]
    fn test_only_spaces_is_empty() {
        assert!(Scope::parse("    ").is_empty());
        assert_eq!(Scope::new().to_string(), "");
    }

    #[test]
    fn test_no_case_folding_and_dedup() {
        let scope = Scope::parse("scope-a scope-A scope-a");
        assert_eq!(scope.len(), 2);
        assert!(!scope.contains("SCOPE-A"));
    }

    #[test]
    fn test_roundtrip_through_text() {
        let scope: Scope = ["scope-a", "scope-B", "x"].into_iter().collect();
        let text = scope.to_string();
        assert_eq!(Scope::parse(&text), scope);
        let mut tokens: Vec<&str> = text.split(' ').collect();
        tokens.sort();
        assert_eq!(tokens, vec!["scope-B", "scope-a", "x"]);
    }

    #[test]
    fn test_equality_is_order_insensitive() {
        assert_eq!(Scope::parse("a b c"), Scope::parse("c a b"));
    }

    #[test]
    fn test_missing_from() {
        let required = Scope::parse("read write admin");
        let granted = Scope::parse("read");
        let missing: Vec<&str> = required.missing_from(&granted).collect();
        assert_eq!(missing, vec!["admin", "write"]);
        assert!(granted.is_subset(&required));
    }

    #[test]
    fn test_serde_as_string() {
        let scope = Scope::parse("b a");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"a b\"");
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }
}
