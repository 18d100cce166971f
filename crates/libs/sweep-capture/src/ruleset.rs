//! Rule sets and extraction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use sweep_params::Value;

use crate::prelude::*;
use crate::rule::{CaptureMode, CaptureRule, CaptureType};

/// A captured field: one typed scalar, or an ordered series of them when
/// the rule's mode is `all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapturedValue {
    Scalar(Value),
    Series(Vec<Value>),
}

impl CapturedValue {
    /// The scalar payload, if this is not a series.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            CapturedValue::Scalar(v) => Some(v),
            CapturedValue::Series(_) => None,
        }
    }

    /// The series payload, if this is one.
    pub fn as_series(&self) -> Option<&[Value]> {
        match self {
            CapturedValue::Scalar(_) => None,
            CapturedValue::Series(v) => Some(v),
        }
    }
}

/// A type-coercion failure for one field. Non-fatal: the field is simply
/// absent from the extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFailure {
    /// Field whose value could not be coerced.
    pub field: String,
    /// The offending matched text.
    pub text: String,
}

/// The outcome of applying a rule set to one command's stdout.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Successfully captured fields.
    pub fields: BTreeMap<String, CapturedValue>,
    /// Fields dropped because their text did not parse as the declared type.
    pub failures: Vec<TypeFailure>,
}

/// An ordered set of capture rules applied to the same output.
///
/// Rules are applied independently and their field sets merged; a field
/// produced by two rules is a configuration error caught here, at load
/// time, not at capture time.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CaptureRule>,
}

impl RuleSet {
    /// Validate and assemble a rule set.
    pub fn new(rules: Vec<CaptureRule>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            for (field, _) in rule.fields() {
                if !seen.insert(field.clone()) {
                    return Err(Error::FieldCollision(field));
                }
            }
        }
        Ok(Self { rules })
    }

    /// An empty rule set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every field this set can produce, with declared type and mode.
    pub fn declared_fields(&self) -> Vec<(String, CaptureType, CaptureMode)> {
        self.rules
            .iter()
            .flat_map(|rule| {
                rule.fields()
                    .into_iter()
                    .map(|(name, kind)| (name, kind, rule.mode()))
            })
            .collect()
    }

    /// Apply every rule to `text` and merge the captured fields.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut extraction = Extraction::default();
        for rule in &self.rules {
            extract_rule(rule, text, &mut extraction);
        }
        for failure in &extraction.failures {
            warn!(
                field = %failure.field,
                text = %failure.text,
                "captured value does not parse as its declared type"
            );
        }
        extraction
    }
}

fn extract_rule(rule: &CaptureRule, text: &str, out: &mut Extraction) {
    // Occurrences per field, in document order.
    let mut occurrences: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for caps in rule.regex_ref().captures_iter(text) {
        for name in rule.regex_ref().capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                occurrences.entry(name.to_string()).or_default().push(m.as_str());
            }
        }
    }

    for (field, texts) in occurrences {
        let kind = rule.type_of(&field);
        // The mode picks its occurrences before coercion, so a malformed
        // occurrence the mode discards cannot sink the field.
        let kept: Vec<&str> = match rule.mode() {
            CaptureMode::All => texts,
            CaptureMode::First => texts.first().copied().into_iter().collect(),
            CaptureMode::Last => texts.last().copied().into_iter().collect(),
        };
        let mut values = Vec::with_capacity(kept.len());
        let mut failed = false;
        for raw in &kept {
            match coerce(raw, kind) {
                Some(value) => values.push(value),
                None => {
                    out.failures.push(TypeFailure {
                        field: field.clone(),
                        text: (*raw).to_string(),
                    });
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }
        let captured = match rule.mode() {
            CaptureMode::All => CapturedValue::Series(values),
            CaptureMode::First | CaptureMode::Last => match values.pop() {
                Some(value) => CapturedValue::Scalar(value),
                None => continue,
            },
        };
        out.fields.insert(field, captured);
    }
}

fn coerce(text: &str, kind: CaptureType) -> Option<Value> {
    match kind {
        CaptureType::Integer => text.parse::<i64>().ok().map(Value::Int),
        CaptureType::Float => text.parse::<f64>().ok().map(Value::Float),
        CaptureType::String => Some(Value::Str(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "step 1\nstep 2\nstep 3\n";

    fn steps_rule(mode: CaptureMode) -> CaptureRule {
        CaptureRule::prefix("step", "step", CaptureType::Integer, mode).unwrap()
    }

    #[test]
    fn mode_all_keeps_document_order() {
        let rules = RuleSet::new(vec![steps_rule(CaptureMode::All)]).unwrap();
        let extraction = rules.extract(TEXT);
        assert_eq!(
            extraction.fields.get("step").unwrap().as_series().unwrap(),
            &[Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn mode_first_and_last() {
        let first = RuleSet::new(vec![steps_rule(CaptureMode::First)]).unwrap();
        let last = RuleSet::new(vec![steps_rule(CaptureMode::Last)]).unwrap();
        assert_eq!(
            first.extract(TEXT).fields.get("step").unwrap().as_scalar(),
            Some(&Value::Int(1))
        );
        assert_eq!(
            last.extract(TEXT).fields.get("step").unwrap().as_scalar(),
            Some(&Value::Int(3))
        );
    }

    #[test]
    fn absent_when_no_match() {
        let rules = RuleSet::new(vec![steps_rule(CaptureMode::Last)]).unwrap();
        let extraction = rules.extract("nothing to see");
        assert!(extraction.fields.is_empty());
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn coercion_failure_drops_field() {
        let mut types = BTreeMap::new();
        types.insert("n".to_string(), CaptureType::Integer);
        let rule =
            CaptureRule::regex_with_types(r"value (?P<n>\S+)", CaptureMode::Last, types).unwrap();
        let rules = RuleSet::new(vec![rule]).unwrap();

        let extraction = rules.extract("value notanumber");
        assert!(extraction.fields.is_empty());
        assert_eq!(
            extraction.failures,
            vec![TypeFailure {
                field: "n".into(),
                text: "notanumber".into(),
            }]
        );
    }

    #[test]
    fn discarded_occurrence_does_not_sink_the_field() {
        let mut types = BTreeMap::new();
        types.insert("n".to_string(), CaptureType::Integer);
        let rule =
            CaptureRule::regex_with_types(r"value (?P<n>\S+)", CaptureMode::Last, types).unwrap();
        let rules = RuleSet::new(vec![rule]).unwrap();

        // Only the last occurrence is kept, so the earlier malformed one
        // is never coerced.
        let extraction = rules.extract("value bad\nvalue 3\n");
        assert_eq!(
            extraction.fields.get("n").unwrap().as_scalar(),
            Some(&Value::Int(3))
        );
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn first_mode_ignores_later_malformed_occurrences() {
        let mut types = BTreeMap::new();
        types.insert("n".to_string(), CaptureType::Integer);
        let rule =
            CaptureRule::regex_with_types(r"value (?P<n>\S+)", CaptureMode::First, types).unwrap();
        let rules = RuleSet::new(vec![rule]).unwrap();

        let extraction = rules.extract("value 7\nvalue bad\n");
        assert_eq!(
            extraction.fields.get("n").unwrap().as_scalar(),
            Some(&Value::Int(7))
        );
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn independent_rules_merge() {
        let rules = RuleSet::new(vec![
            CaptureRule::prefix("a", "alpha", CaptureType::Float, CaptureMode::Last).unwrap(),
            CaptureRule::prefix("b", "beta", CaptureType::Float, CaptureMode::Last).unwrap(),
        ])
        .unwrap();
        let extraction = rules.extract("alpha 1.0\nbeta 2.0\n");
        assert_eq!(extraction.fields.len(), 2);
    }

    #[test]
    fn collision_across_rules_is_load_error() {
        let result = RuleSet::new(vec![
            CaptureRule::prefix("x", "one", CaptureType::Float, CaptureMode::Last).unwrap(),
            CaptureRule::prefix("x", "two", CaptureType::Float, CaptureMode::Last).unwrap(),
        ]);
        assert!(matches!(result, Err(Error::FieldCollision(_))));
    }

    #[test]
    fn named_groups_from_raw_pattern() {
        let rule = CaptureRule::regex(
            r"(?P<key>\w+)=(?P<val>\w+)",
            CaptureMode::All,
        )
        .unwrap();
        let rules = RuleSet::new(vec![rule]).unwrap();
        let extraction = rules.extract("a=1 b=2");
        assert_eq!(
            extraction.fields.get("key").unwrap().as_series().unwrap(),
            &[Value::Str("a".into()), Value::Str("b".into())]
        );
        assert_eq!(
            extraction.fields.get("val").unwrap().as_series().unwrap(),
            &[Value::Str("1".into()), Value::Str("2".into())]
        );
    }
}
