//! The case model: the core's view of an evaluated job description.
//!
//! The configuration language that produces this structure is an external
//! collaborator. Everything parameter-dependent arrives as a
//! [`Resolvable`]: either a literal, or an opaque function of the point's
//! named-value context. The core always supplies the full context
//! (parameters, derived values, instance metadata) and never inspects
//! which names a function actually uses.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sweep_exec::CommandSpec;
use sweep_params::{Context, EvalPolicy, Evaluator, ParameterSpace};
use sweep_stage::{FileRule, Renderer, VarRenderer};

use crate::prelude::*;

/// A value that is either known up front or computed per parameter point.
#[derive(Clone)]
pub enum Resolvable<T> {
    /// The same value for every point.
    Literal(T),
    /// Computed from the point's named-value context.
    PerPoint(Arc<dyn Fn(&Context) -> std::result::Result<T, String> + Send + Sync>),
}

impl<T: Clone> Resolvable<T> {
    /// Resolve for one point.
    pub fn resolve(&self, what: &'static str, ordinal: u64, ctx: &Context) -> Result<T> {
        match self {
            Resolvable::Literal(value) => Ok(value.clone()),
            Resolvable::PerPoint(f) => f(ctx).map_err(|reason| Error::Resolve {
                what,
                ordinal,
                reason,
            }),
        }
    }

    /// The literal payload, when there is one.
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Resolvable::Literal(value) => Some(value),
            Resolvable::PerPoint(_) => None,
        }
    }
}

impl<T> From<T> for Resolvable<T> {
    fn from(value: T) -> Self {
        Resolvable::Literal(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolvable::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Resolvable::PerPoint(_) => f.write_str("PerPoint(..)"),
        }
    }
}

/// Run settings attached to a case.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Result store root directory.
    pub store_root: PathBuf,
    /// Per-instance log directory name, rendered against the point
    /// context.
    pub logdir: String,
    /// Tolerate missing staged/collected files instead of failing.
    pub ignore_missing: bool,
    /// Bounded wait for the store's cross-process lock.
    pub lock_timeout: Duration,
}

impl Settings {
    /// Defaults: instances logged under their ordinal.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            logdir: "${_index}".to_string(),
            ignore_missing: false,
            lock_timeout: sweep_store::store::DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// One complete case: parameter space, derived values, file maps, script
/// and settings, as handed over by the configuration collaborator.
#[derive(Clone)]
pub struct CaseModel {
    /// The declared parameter space.
    pub space: ParameterSpace,
    /// Derived value names, in evaluation order.
    pub derived: Vec<String>,
    /// Derived-value collaborator; required when `derived` is non-empty.
    pub evaluator: Option<Arc<dyn Evaluator>>,
    /// Failure policy for derived-value evaluation.
    pub eval_policy: EvalPolicy,
    /// Files staged into the working directory before the script.
    pub pre_files: Resolvable<Vec<FileRule>>,
    /// Files collected back into the store after the script.
    pub post_files: Resolvable<Vec<FileRule>>,
    /// The instance script.
    pub script: Resolvable<Vec<CommandSpec>>,
    /// Template/interpolation collaborator.
    pub renderer: Arc<dyn Renderer>,
    /// Case source directory (read-only input area).
    pub source_root: PathBuf,
    /// Run settings.
    pub settings: Settings,
}

impl CaseModel {
    /// A minimal model: empty script, no files, built-in renderer.
    pub fn new(
        space: ParameterSpace,
        source_root: impl Into<PathBuf>,
        store_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            space,
            derived: Vec::new(),
            evaluator: None,
            eval_policy: EvalPolicy::default(),
            pre_files: Vec::new().into(),
            post_files: Vec::new().into(),
            script: Vec::new().into(),
            renderer: Arc::new(VarRenderer),
            source_root: source_root.into(),
            settings: Settings::new(store_root),
        }
    }

    /// Pre-dispatch validation.
    ///
    /// A capture field produced by two different commands, or shadowing a
    /// parameter or derived value, is a configuration error caught here —
    /// not a runtime surprise. Per-point scripts get the same check when
    /// they are resolved.
    pub fn validate(&self) -> Result<()> {
        if let Some(script) = self.script.as_literal() {
            validate_script(script, &self.reserved_names())?;
        }
        Ok(())
    }

    /// Names a captured field must not shadow.
    pub(crate) fn reserved_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .space
            .parameters()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        names.extend(self.derived.iter().cloned());
        names
    }
}

/// Reject capture field collisions across the commands of one script,
/// including fields that would shadow a parameter or derived value.
pub(crate) fn validate_script(
    script: &[CommandSpec],
    reserved: &BTreeSet<String>,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    for command in script {
        for (field, _, _) in command.captures.declared_fields() {
            if reserved.contains(&field) || !seen.insert(field.clone()) {
                return Err(sweep_capture::error::Error::FieldCollision(field).into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_capture::{CaptureMode, CaptureRule, CaptureType, RuleSet};
    use sweep_params::{Parameter, Value};

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::listed("n", vec![Value::Int(1)]).unwrap(),
        ])
        .unwrap()
    }

    fn captured(name: &str) -> CommandSpec {
        let mut spec = CommandSpec::shell("true");
        spec.captures = RuleSet::new(vec![
            CaptureRule::prefix(name, "x", CaptureType::Float, CaptureMode::Last).unwrap(),
        ])
        .unwrap();
        spec
    }

    #[test]
    fn cross_command_field_collision_is_caught_at_load() {
        let mut model = CaseModel::new(space(), ".", ".store");
        model.script = vec![captured("dup"), captured("dup")].into();
        assert!(model.validate().is_err());
    }

    #[test]
    fn capture_field_shadowing_a_parameter_is_rejected() {
        let mut model = CaseModel::new(space(), ".", ".store");
        model.script = vec![captured("n")].into();
        assert!(model.validate().is_err());
    }

    #[test]
    fn distinct_fields_pass_validation() {
        let mut model = CaseModel::new(space(), ".", ".store");
        model.script = vec![captured("a"), captured("b")].into();
        model.validate().unwrap();
    }

    #[test]
    fn per_point_scripts_validate_at_resolution() {
        let mut model = CaseModel::new(space(), ".", ".store");
        model.script = Resolvable::PerPoint(Arc::new(|_ctx| Ok(vec![])));
        // Nothing to check up front.
        model.validate().unwrap();
    }

    #[test]
    fn resolvable_per_point_sees_context() {
        let resolvable: Resolvable<Vec<String>> = Resolvable::PerPoint(Arc::new(|ctx| {
            let n = ctx
                .get("n")
                .map(|v| v.to_string())
                .ok_or_else(|| "missing n".to_string())?;
            Ok(vec![format!("--n={n}")])
        }));
        let mut ctx = Context::new();
        ctx.insert("n".into(), Value::Int(3));
        assert_eq!(
            resolvable.resolve("args", 0, &ctx).unwrap(),
            vec!["--n=3".to_string()]
        );
    }
}
