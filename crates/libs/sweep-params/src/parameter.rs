//! Parameter declarations and the Cartesian product space.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::point::ParameterPoint;
use crate::prelude::*;
use crate::value::Value;

/// One declared parameter: a name and its ordered, non-empty value list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    values: Vec<Value>,
}

impl Parameter {
    /// A parameter with an explicit value list.
    pub fn listed(name: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(Error::EmptyParameter(name));
        }
        Ok(Self { name, values })
    }

    /// `num` equally spaced values over `[lo, hi]`, inclusive of both ends.
    ///
    /// `num == 1` yields `[lo]`.
    pub fn uniform(name: impl Into<String>, lo: f64, hi: f64, num: usize) -> Result<Self> {
        let name = name.into();
        if num == 0 {
            return Err(Error::InvalidSampleCount { name, num });
        }
        let values = if num == 1 {
            vec![Value::Float(lo)]
        } else {
            (0..num)
                .map(|i| Value::Float(lo + (hi - lo) * i as f64 / (num - 1) as f64))
                .collect()
        };
        Ok(Self { name, values })
    }

    /// `num` geometrically spaced values over `[lo, hi]`, where the ratio
    /// between successive subdivision lengths is `grading`.
    ///
    /// `grading == 1` degenerates to uniform spacing.
    pub fn graded(
        name: impl Into<String>,
        lo: f64,
        hi: f64,
        num: usize,
        grading: f64,
    ) -> Result<Self> {
        let name = name.into();
        if num == 0 {
            return Err(Error::InvalidSampleCount { name, num });
        }
        if !grading.is_finite() || grading <= 0.0 {
            return Err(Error::InvalidGrading { name, grading });
        }
        if num == 1 {
            return Ok(Self {
                name,
                values: vec![Value::Float(lo)],
            });
        }
        if (grading - 1.0).abs() < 1e-12 {
            return Self::uniform(name, lo, hi, num);
        }
        // First subdivision length such that the graded lengths sum to hi - lo.
        let mut step = (hi - lo) * (1.0 - grading) / (1.0 - grading.powi(num as i32 - 1));
        let mut values = vec![Value::Float(lo)];
        let mut current = lo;
        for _ in 0..num - 1 {
            current += step;
            values.push(Value::Float(current));
            step *= grading;
        }
        Ok(Self { name, values })
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered value list.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: empty parameters are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The full parameter space: an ordered set of parameters whose Cartesian
/// product defines the job instances of a run.
///
/// Immutable once built. Enumeration order is row-major over the
/// declaration order with the last-declared parameter varying fastest,
/// mirroring nested-loop semantics, and assigns every point a stable
/// ordinal in `[0, num_points())`. Re-enumeration yields identical
/// ordinals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
}

impl ParameterSpace {
    /// Build a space from ordered parameter declarations.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for param in &parameters {
            if param.values.is_empty() {
                return Err(Error::EmptyParameter(param.name.clone()));
            }
            if !seen.insert(param.name.clone()) {
                return Err(Error::DuplicateParameter(param.name.clone()));
            }
        }
        Ok(Self { parameters })
    }

    /// Declared parameters, in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Total number of points: the product of per-parameter cardinalities.
    pub fn num_points(&self) -> u64 {
        self.parameters.iter().map(|p| p.len() as u64).product()
    }

    /// The point with the given ordinal, or `None` when out of range.
    pub fn point_at(&self, ordinal: u64) -> Option<ParameterPoint> {
        if ordinal >= self.num_points() {
            return None;
        }
        let mut assignment = Vec::with_capacity(self.parameters.len());
        let mut stride = self.num_points();
        let mut rest = ordinal;
        for param in &self.parameters {
            stride /= param.len() as u64;
            let index = (rest / stride) as usize;
            rest %= stride;
            assignment.push((param.name.clone(), param.values[index].clone()));
        }
        Some(ParameterPoint::new(ordinal, assignment))
    }

    /// Lazy, restartable enumeration of all points in ordinal order.
    pub fn points(&self) -> PointIter<'_> {
        PointIter {
            space: self,
            next: 0,
        }
    }
}

/// Iterator over the points of a [`ParameterSpace`].
pub struct PointIter<'a> {
    space: &'a ParameterSpace,
    next: u64,
}

impl Iterator for PointIter<'_> {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<ParameterPoint> {
        let point = self.space.point_at(self.next)?;
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.space.num_points() - self.next) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space2x2() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::listed("a", vec![Value::Int(1), Value::Int(2)]).unwrap(),
            Parameter::listed("b", vec![Value::Str("x".into()), Value::Str("y".into())]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn uniform_inclusive_endpoints() {
        let p = Parameter::uniform("x", 0.0, 1.0, 5).unwrap();
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        for (value, want) in p.values().iter().zip(expected) {
            assert_eq!(value.as_f64().unwrap(), want);
        }
    }

    #[test]
    fn uniform_single_point_is_lo() {
        let p = Parameter::uniform("x", 3.0, 9.0, 1).unwrap();
        assert_eq!(p.values(), &[Value::Float(3.0)]);
    }

    #[test]
    fn graded_unit_factor_matches_uniform() {
        let graded = Parameter::graded("x", 0.0, 1.0, 5, 1.0).unwrap();
        let uniform = Parameter::uniform("x", 0.0, 1.0, 5).unwrap();
        for (a, b) in graded.values().iter().zip(uniform.values()) {
            assert!((a.as_f64().unwrap() - b.as_f64().unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn graded_step_ratio_holds() {
        let p = Parameter::graded("x", 0.0, 1.0, 4, 2.0).unwrap();
        let v: Vec<f64> = p.values().iter().map(|v| v.as_f64().unwrap()).collect();
        assert!((v[0] - 0.0).abs() < 1e-12);
        assert!((v[3] - 1.0).abs() < 1e-12);
        let steps: Vec<f64> = v.windows(2).map(|w| w[1] - w[0]).collect();
        for pair in steps.windows(2) {
            assert!((pair[1] / pair[0] - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(matches!(
            Parameter::uniform("x", 0.0, 1.0, 0),
            Err(Error::InvalidSampleCount { .. })
        ));
        assert!(matches!(
            Parameter::listed("x", vec![]),
            Err(Error::EmptyParameter(_))
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = ParameterSpace::new(vec![
            Parameter::listed("a", vec![Value::Int(1)]).unwrap(),
            Parameter::listed("a", vec![Value::Int(2)]).unwrap(),
        ]);
        assert!(matches!(result, Err(Error::DuplicateParameter(_))));
    }

    #[test]
    fn last_parameter_varies_fastest() {
        let space = space2x2();
        let points: Vec<_> = space.points().collect();
        let values: Vec<(i64, String)> = points
            .iter()
            .map(|p| {
                (
                    p.parameter("a").unwrap().as_i64().unwrap(),
                    p.parameter("b").unwrap().as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            values,
            vec![
                (1, "x".into()),
                (1, "y".into()),
                (2, "x".into()),
                (2, "y".into()),
            ]
        );
    }

    #[test]
    fn enumeration_is_deterministic_and_complete() {
        let space = ParameterSpace::new(vec![
            Parameter::listed("a", vec![Value::Int(0), Value::Int(1), Value::Int(2)]).unwrap(),
            Parameter::uniform("b", 0.0, 1.0, 4).unwrap(),
            Parameter::listed("c", vec![Value::Bool(false), Value::Bool(true)]).unwrap(),
        ])
        .unwrap();
        assert_eq!(space.num_points(), 24);

        let first: Vec<_> = space.points().collect();
        let second: Vec<_> = space.points().collect();
        assert_eq!(first, second);

        let ordinals: Vec<u64> = first.iter().map(|p| p.ordinal()).collect();
        assert_eq!(ordinals, (0..24).collect::<Vec<u64>>());
    }

    #[test]
    fn point_at_out_of_range() {
        assert!(space2x2().point_at(4).is_none());
    }
}
