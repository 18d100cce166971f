//! Derived-value evaluation.
//!
//! Derived values are computed per point by an external collaborator (the
//! configuration language's expression evaluator). The core hands it the
//! point's full named-value context and records whatever comes back; which
//! names the collaborator actually reads is its own business.

use tracing::warn;

use crate::context::Context;
use crate::point::ParameterPoint;
use crate::prelude::*;
use crate::value::Value;

/// Collaborator seam for derived-value computation.
///
/// `evaluate` is called once per derived name per point, in declaration
/// order; earlier derived values are already present in the context when
/// later ones are evaluated.
pub trait Evaluator: Send + Sync {
    /// Compute the derived value `name` from the given context.
    fn evaluate(&self, name: &str, ctx: &Context) -> std::result::Result<Value, String>;
}

/// What to do when evaluation fails for a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalPolicy {
    /// Abort the whole run. The default, since derived values may gate
    /// later stages.
    #[default]
    AbortAll,
    /// Skip the offending point and keep going.
    SkipPoint,
}

/// Evaluate the named derived values onto a point, in order.
///
/// Returns `Ok(true)` when the point is usable, `Ok(false)` when it was
/// skipped under [`EvalPolicy::SkipPoint`].
pub fn evaluate_point(
    point: &mut ParameterPoint,
    names: &[String],
    evaluator: &dyn Evaluator,
    policy: EvalPolicy,
) -> Result<bool> {
    let mut ctx = point.context();
    for name in names {
        match evaluator.evaluate(name, &ctx) {
            Ok(value) => {
                ctx.insert(name.clone(), value.clone());
                point.push_derived(name.clone(), value);
            }
            Err(reason) => match policy {
                EvalPolicy::AbortAll => {
                    return Err(Error::Evaluation {
                        name: name.clone(),
                        ordinal: point.ordinal(),
                        reason,
                    });
                }
                EvalPolicy::SkipPoint => {
                    warn!(
                        ordinal = point.ordinal(),
                        name = %name,
                        reason = %reason,
                        "skipping point: evaluation failed"
                    );
                    return Ok(false);
                }
            },
        }
    }
    Ok(true)
}
