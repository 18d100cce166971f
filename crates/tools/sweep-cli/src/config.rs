//! TOML case configuration.
//!
//! The on-disk format is declarative: parameters are an ordered array of
//! tables (declaration order decides enumeration order, the last one
//! varying fastest), the script is an array of command tables, and file
//! maps and settings are plain tables. [`UserConfig`] is the raw
//! deserialized form; [`UserConfig::into_model`] translates it into a
//! [`CaseModel`] ready for dispatch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use sweep_capture::{CaptureMode, CaptureRule, CaptureType, RuleSet};
use sweep_core::model::CaseModel;
use sweep_exec::{Args, CommandSpec, Container};
use sweep_params::{Parameter, ParameterSpace, Value};
use sweep_stage::{FileMode, FileRule};

use crate::prelude::*;

/// One parameter declaration: either an explicit value list or a sampled
/// interval.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserParameter {
    pub name: String,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
    #[serde(default)]
    pub interval: Option<[f64; 2]>,
    #[serde(default)]
    pub num: Option<usize>,
    #[serde(default)]
    pub grading: Option<f64>,
}

/// Container settings: a bare image name or a full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserContainer {
    Image(String),
    Full {
        image: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// One capture declaration: a bare regex pattern or a full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserCapture {
    Pattern(String),
    Rule(UserCaptureRule),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCaptureRule {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: CaptureType,
    #[serde(default)]
    pub mode: CaptureMode,
    #[serde(default)]
    pub skip_words: usize,
    #[serde(default)]
    pub flexible_prefix: bool,
    /// Per-group type overrides, only meaningful for pattern rules.
    #[serde(default)]
    pub types: BTreeMap<String, CaptureType>,
}

/// One script command.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCommand {
    #[serde(default)]
    pub name: Option<String>,
    /// Shell form: one line, split after interpolation.
    #[serde(default)]
    pub command: Option<String>,
    /// Exec form: explicit argv, each word interpolated separately.
    #[serde(default)]
    pub argv: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub container: Option<UserContainer>,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub retry_on_fail: bool,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub capture: Vec<UserCapture>,
}

/// One file-map entry: a bare path or a full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserFileRule {
    Path(String),
    Detailed(UserFileRuleDetail),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserFileRuleDetail {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub template: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserFiles {
    #[serde(default)]
    pub pre: Vec<UserFileRule>,
    #[serde(default)]
    pub post: Vec<UserFileRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserSettings {
    /// Source tree the pre-files are staged from, relative to the
    /// configuration file.
    pub source: PathBuf,
    /// Result store root, relative to the configuration file.
    pub storage: PathBuf,
    /// Instance directory template.
    pub logdir: String,
    /// Tolerate missing collected files.
    pub ignore_missing: bool,
    /// Bounded wait for the store lock, in seconds.
    pub lock_timeout_secs: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            storage: PathBuf::from(".sweepdata"),
            logdir: "${_index}".to_string(),
            ignore_missing: false,
            lock_timeout_secs: 30,
        }
    }
}

/// User-provided case configuration from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(default)]
    pub parameters: Vec<UserParameter>,
    #[serde(default)]
    pub script: Vec<UserCommand>,
    #[serde(default)]
    pub files: UserFiles,
    #[serde(default)]
    pub settings: UserSettings,
}

impl UserConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(file_path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(value: &str) -> Result<Self> {
        Ok(toml::from_str(value)?)
    }

    /// Translate into a dispatchable case model. Relative source and
    /// storage paths are resolved against `base`, the directory holding
    /// the configuration file.
    pub fn into_model(self, base: &Path) -> Result<CaseModel> {
        let mut parameters = Vec::with_capacity(self.parameters.len());
        for p in self.parameters {
            parameters.push(build_parameter(p)?);
        }
        let space = ParameterSpace::new(parameters)?;

        let mut script = Vec::with_capacity(self.script.len());
        for c in self.script {
            script.push(build_command(c)?);
        }

        let mut model = CaseModel::new(
            space,
            base.join(&self.settings.source),
            base.join(&self.settings.storage),
        );
        model.script = script.into();
        model.pre_files = build_file_rules(self.files.pre)?.into();
        model.post_files = build_file_rules(self.files.post)?.into();
        model.settings.logdir = self.settings.logdir;
        model.settings.ignore_missing = self.settings.ignore_missing;
        model.settings.lock_timeout = Duration::from_secs(self.settings.lock_timeout_secs);
        model.validate()?;
        Ok(model)
    }
}

fn build_parameter(p: UserParameter) -> Result<Parameter> {
    match (p.values, p.interval) {
        (Some(values), None) => Ok(Parameter::listed(p.name, values)?),
        (None, Some([lo, hi])) => {
            let num = p.num.ok_or_else(|| {
                Error::Config(format!("parameter {:?}: interval requires num", p.name))
            })?;
            match p.grading {
                Some(grading) => Ok(Parameter::graded(p.name, lo, hi, num, grading)?),
                None => Ok(Parameter::uniform(p.name, lo, hi, num)?),
            }
        }
        (Some(_), Some(_)) => Err(Error::Config(format!(
            "parameter {:?}: values and interval are mutually exclusive",
            p.name
        ))),
        (None, None) => Err(Error::Config(format!(
            "parameter {:?}: expected values or interval",
            p.name
        ))),
    }
}

fn build_command(c: UserCommand) -> Result<CommandSpec> {
    let args = match (c.command, c.argv) {
        (Some(line), None) => Args::Shell(line),
        (None, Some(argv)) => Args::Exec(argv),
        (Some(_), Some(_)) => {
            return Err(Error::Config(
                "command and argv are mutually exclusive".to_string(),
            ));
        }
        (None, None) => {
            return Err(Error::Config(
                "script entry needs a command or an argv".to_string(),
            ));
        }
    };

    let mut spec = match c.name {
        Some(name) => CommandSpec::named(name, args),
        None => CommandSpec::new(args),
    };
    spec.env = c.env;
    spec.container = c.container.map(|container| match container {
        UserContainer::Image(image) => Container {
            image,
            args: Vec::new(),
        },
        UserContainer::Full { image, args } => Container { image, args },
    });
    spec.allow_failure = c.allow_failure;
    spec.retry_on_fail = c.retry_on_fail;
    spec.workdir = c.workdir;

    let mut rules = Vec::with_capacity(c.capture.len());
    for capture in c.capture {
        rules.push(build_capture(capture)?);
    }
    spec.captures = RuleSet::new(rules)?;
    Ok(spec)
}

fn build_capture(capture: UserCapture) -> Result<CaptureRule> {
    let rule = match capture {
        UserCapture::Pattern(pattern) => {
            return Ok(CaptureRule::regex(&pattern, CaptureMode::default())?);
        }
        UserCapture::Rule(rule) => rule,
    };
    match (rule.pattern, rule.prefix) {
        (Some(pattern), None) => Ok(CaptureRule::regex_with_types(
            &pattern, rule.mode, rule.types,
        )?),
        (None, Some(prefix)) => {
            let field = rule.field.ok_or_else(|| {
                Error::Config(format!("capture prefix {prefix:?} needs a field name"))
            })?;
            Ok(CaptureRule::prefix_full(
                field,
                &prefix,
                rule.kind,
                rule.mode,
                rule.skip_words,
                rule.flexible_prefix,
            )?)
        }
        (Some(_), Some(_)) => Err(Error::Config(
            "capture pattern and prefix are mutually exclusive".to_string(),
        )),
        (None, None) => Err(Error::Config(
            "capture entry needs a pattern or a prefix".to_string(),
        )),
    }
}

fn build_file_rules(rules: Vec<UserFileRule>) -> Result<Vec<FileRule>> {
    rules.into_iter().map(build_file_rule).collect()
}

fn build_file_rule(rule: UserFileRule) -> Result<FileRule> {
    let detail = match rule {
        UserFileRule::Path(source) => return Ok(FileRule::simple(source)),
        UserFileRule::Detailed(detail) => detail,
    };
    match (detail.source, detail.glob) {
        (Some(source), None) => Ok(FileRule {
            source,
            target: detail.target,
            template: detail.template,
            mode: FileMode::Simple,
        }),
        (None, Some(pattern)) => {
            if detail.template {
                return Err(Error::Config(format!(
                    "glob {pattern:?} cannot be a template"
                )));
            }
            Ok(FileRule::glob(
                pattern,
                detail.target.unwrap_or_else(|| ".".to_string()),
            ))
        }
        (Some(_), Some(_)) => Err(Error::Config(
            "file source and glob are mutually exclusive".to_string(),
        )),
        (None, None) => Err(Error::Config(
            "file entry needs a source or a glob".to_string(),
        )),
    }
}
