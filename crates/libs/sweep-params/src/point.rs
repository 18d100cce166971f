//! Concrete parameter points.

use serde::{Deserialize, Serialize};

use crate::context::{Context, INDEX_KEY};
use crate::value::Value;

/// One element of the Cartesian product: an assignment of a single value
/// to every declared parameter, plus derived values evaluated from them.
///
/// The ordinal is the point's position in the enumeration order and is its
/// identity key in the result store; it never depends on execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    ordinal: u64,
    parameters: Vec<(String, Value)>,
    derived: Vec<(String, Value)>,
}

impl ParameterPoint {
    pub(crate) fn new(ordinal: u64, parameters: Vec<(String, Value)>) -> Self {
        Self {
            ordinal,
            parameters,
            derived: Vec::new(),
        }
    }

    /// Deterministic enumeration index of this point.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Parameter assignments, in declaration order.
    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// Derived values, in evaluation order.
    pub fn derived(&self) -> &[(String, Value)] {
        &self.derived
    }

    /// Value of one named parameter.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Record a derived value on this point.
    pub(crate) fn push_derived(&mut self, name: String, value: Value) {
        self.derived.push((name, value));
    }

    /// The full named-argument context for this point: parameters, derived
    /// values and the ordinal under [`INDEX_KEY`].
    pub fn context(&self) -> Context {
        let mut ctx = Context::new();
        for (name, value) in &self.parameters {
            ctx.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.derived {
            ctx.insert(name.clone(), value.clone());
        }
        ctx.insert(INDEX_KEY.to_string(), Value::Int(self.ordinal as i64));
        ctx
    }
}
