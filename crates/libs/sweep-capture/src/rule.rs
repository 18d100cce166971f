//! Capture rule definitions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::prelude::*;

/// Which occurrence(s) of a matching field to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Keep the first occurrence.
    First,
    /// Keep the last occurrence. The default.
    #[default]
    Last,
    /// Keep every occurrence, in document order.
    All,
}

/// Declared type of a captured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureType {
    Integer,
    Float,
    #[default]
    String,
}

impl CaptureType {
    /// Regex fragment matching one value of this type.
    fn value_pattern(self) -> &'static str {
        match self {
            CaptureType::Integer => r"[-+]?[0-9]+",
            CaptureType::Float => r"[-+]?(?:(?:\d*\.\d+)|(?:\d+\.?))(?:[Ee][+-]?\d+)?",
            CaptureType::String => r"\S+",
        }
    }
}

/// One capture rule: a compiled regular expression whose named groups are
/// the produced fields, plus an aggregation mode and per-field types.
#[derive(Debug, Clone)]
pub struct CaptureRule {
    regex: Regex,
    mode: CaptureMode,
    types: BTreeMap<String, CaptureType>,
}

impl CaptureRule {
    /// A rule from a raw pattern. Every named group becomes a field;
    /// groups without a type override are treated as strings.
    pub fn regex(pattern: &str, mode: CaptureMode) -> Result<Self> {
        Self::regex_with_types(pattern, mode, BTreeMap::new())
    }

    /// A raw-pattern rule with explicit field types.
    pub fn regex_with_types(
        pattern: &str,
        mode: CaptureMode,
        types: BTreeMap<String, CaptureType>,
    ) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        if regex.capture_names().flatten().next().is_none() {
            return Err(Error::NoFields(pattern.to_string()));
        }
        Ok(Self { regex, mode, types })
    }

    /// The `(prefix, type, mode)` shorthand: match `prefix`, an optional
    /// `:` or `=` separator, then a value of the given type, bound to
    /// `field`.
    pub fn prefix(
        field: impl Into<String>,
        prefix: &str,
        kind: CaptureType,
        mode: CaptureMode,
    ) -> Result<Self> {
        Self::prefix_full(field, prefix, kind, mode, 0, false)
    }

    /// The prefix shorthand with all knobs: `skip_words` whitespace-
    /// separated words are skipped between the separator and the value,
    /// and `flexible_prefix` matches any run of whitespace inside the
    /// prefix text.
    pub fn prefix_full(
        field: impl Into<String>,
        prefix: &str,
        kind: CaptureType,
        mode: CaptureMode,
        skip_words: usize,
        flexible_prefix: bool,
    ) -> Result<Self> {
        let field = field.into();
        if !valid_field_name(&field) {
            return Err(Error::InvalidFieldName(field));
        }
        let prefix_pattern = if flexible_prefix {
            prefix
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        } else {
            regex::escape(prefix)
        };
        let pattern = format!(
            r"{prefix_pattern}\s*[:=]?\s*(?:\S+\s+){{{skip_words}}}(?P<{field}>{value})",
            value = kind.value_pattern(),
        );
        let regex = Regex::new(&pattern)?;
        let mut types = BTreeMap::new();
        types.insert(field, kind);
        Ok(Self { regex, mode, types })
    }

    /// Aggregation mode of this rule.
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// The fields this rule produces, with their declared types.
    pub fn fields(&self) -> Vec<(String, CaptureType)> {
        self.regex
            .capture_names()
            .flatten()
            .map(|name| {
                let kind = self.types.get(name).copied().unwrap_or_default();
                (name.to_string(), kind)
            })
            .collect()
    }

    pub(crate) fn regex_ref(&self) -> &Regex {
        &self.regex
    }

    pub(crate) fn type_of(&self, field: &str) -> CaptureType {
        self.types.get(field).copied().unwrap_or_default()
    }
}

fn valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_builds_typed_field() {
        let rule = CaptureRule::prefix("steps", "iterations", CaptureType::Integer, CaptureMode::Last)
            .unwrap();
        assert_eq!(
            rule.fields(),
            vec![("steps".to_string(), CaptureType::Integer)]
        );
    }

    #[test]
    fn prefix_matches_separator_variants() {
        let rule =
            CaptureRule::prefix("n", "count", CaptureType::Integer, CaptureMode::Last).unwrap();
        for text in ["count 7", "count: 7", "count=7", "count :  7"] {
            assert!(rule.regex_ref().is_match(text), "no match in {text:?}");
        }
    }

    #[test]
    fn skip_words_are_honoured() {
        let rule = CaptureRule::prefix_full(
            "t",
            "elapsed",
            CaptureType::Float,
            CaptureMode::Last,
            2,
            false,
        )
        .unwrap();
        let caps = rule.regex_ref().captures("elapsed wall clock 12.5").unwrap();
        assert_eq!(&caps["t"], "12.5");
    }

    #[test]
    fn pattern_without_groups_rejected() {
        assert!(matches!(
            CaptureRule::regex("no groups here", CaptureMode::All),
            Err(Error::NoFields(_))
        ));
    }

    #[test]
    fn bad_field_name_rejected() {
        assert!(matches!(
            CaptureRule::prefix("2fast", "x", CaptureType::Float, CaptureMode::Last),
            Err(Error::InvalidFieldName(_))
        ));
    }
}
