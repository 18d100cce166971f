//! Command specifications.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sweep_capture::RuleSet;
use sweep_params::Context;
use sweep_stage::Renderer;

use crate::prelude::*;

/// Command argument form.
///
/// The shell form is split by shell word rules once, up front; it is never
/// handed to an actual shell for re-interpretation. The exec form passes
/// arguments through verbatim (after `${name}` interpolation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args {
    /// A single string split by shell rules.
    Shell(String),
    /// An explicit argument vector.
    Exec(Vec<String>),
}

impl Args {
    /// The program word, used for default command naming.
    fn program(&self) -> Option<String> {
        match self {
            Args::Shell(line) => shlex::split(line)?.into_iter().next(),
            Args::Exec(argv) => argv.first().cloned(),
        }
    }
}

/// Container descriptor: run the command inside `docker run` with the
/// working directory bind-mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Image name.
    pub image: String,
    /// Extra arguments for the container invocation.
    pub args: Vec<String>,
}

/// One command in an instance script.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Command name, used for log file naming and reporting.
    pub name: String,
    /// Argument form.
    pub args: Args,
    /// Environment overlay applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Optional container to run inside.
    pub container: Option<Container>,
    /// A non-zero exit records the failure and proceeds to the next
    /// command instead of aborting the script.
    pub allow_failure: bool,
    /// A non-zero exit re-invokes the command unconditionally: no backoff
    /// and no retry limit. Deliberate, documented hazard; the caller's
    /// cancellation flag is the only way out.
    pub retry_on_fail: bool,
    /// Capture rules applied to this command's stdout.
    pub captures: RuleSet,
    /// Working directory override, relative to the instance directory.
    pub workdir: Option<PathBuf>,
}

impl CommandSpec {
    /// A command named after its program word.
    pub fn new(args: Args) -> Self {
        let name = args
            .program()
            .map(|p| basename(&p))
            .unwrap_or_else(|| "command".to_string());
        Self::named(name, args)
    }

    /// A command with an explicit name.
    pub fn named(name: impl Into<String>, args: Args) -> Self {
        Self {
            name: name.into(),
            args,
            env: BTreeMap::new(),
            container: None,
            allow_failure: false,
            retry_on_fail: false,
            captures: RuleSet::empty(),
            workdir: None,
        }
    }

    /// A shell-form command.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new(Args::Shell(line.into()))
    }

    /// An exec-form command.
    pub fn exec(argv: Vec<String>) -> Self {
        Self::new(Args::Exec(argv))
    }

    /// Build the final argument vector for one invocation: interpolate
    /// `${name}` references, then wrap in the container prefix if a
    /// container descriptor is present.
    pub fn argv(
        &self,
        work_dir: &Path,
        ctx: &Context,
        renderer: &dyn Renderer,
    ) -> Result<Vec<String>> {
        let argv = match &self.args {
            Args::Shell(line) => {
                let rendered = renderer.render(line, ctx)?;
                shlex::split(&rendered).ok_or_else(|| Error::ShellSyntax(rendered.clone()))?
            }
            Args::Exec(args) => args
                .iter()
                .map(|arg| renderer.render(arg, ctx).map_err(Error::from))
                .collect::<Result<Vec<_>>>()?,
        };

        let Some(container) = &self.container else {
            return Ok(argv);
        };

        let mut wrapped = vec!["docker".to_string(), "run".to_string()];
        wrapped.extend(container.args.iter().cloned());
        wrapped.push(format!("-v{}:/workdir", work_dir.display()));
        wrapped.push("--workdir".to_string());
        wrapped.push("/workdir".to_string());
        wrapped.push(container.image.clone());
        if !argv.is_empty() {
            wrapped.push("sh".to_string());
            wrapped.push("-c".to_string());
            wrapped.push(shlex::try_join(argv.iter().map(String::as_str))?);
        }
        Ok(wrapped)
    }
}

fn basename(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_params::Value;
    use sweep_stage::VarRenderer;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("retcode".into(), Value::Int(1));
        ctx.insert("mesh".into(), Value::Str("coarse grid".into()));
        ctx
    }

    #[test]
    fn shell_form_splits_by_word_rules() {
        let spec = CommandSpec::shell("solver --mesh 'a b.msh' -n ${retcode}");
        let argv = spec.argv(Path::new("/wd"), &ctx(), &VarRenderer).unwrap();
        assert_eq!(argv, vec!["solver", "--mesh", "a b.msh", "-n", "1"]);
    }

    #[test]
    fn exec_form_interpolates_but_never_splits() {
        let spec = CommandSpec::exec(vec!["echo".into(), "${mesh}".into()]);
        let argv = spec.argv(Path::new("/wd"), &ctx(), &VarRenderer).unwrap();
        // The interpolated space stays inside one argument.
        assert_eq!(argv, vec!["echo", "coarse grid"]);
    }

    #[test]
    fn default_name_is_program_basename() {
        assert_eq!(CommandSpec::shell("/usr/bin/solver --fast").name, "solver");
    }

    #[test]
    fn container_wraps_argv() {
        let mut spec = CommandSpec::shell("make test");
        spec.container = Some(Container {
            image: "alpine:3".into(),
            args: vec!["--rm".into()],
        });
        let argv = spec.argv(Path::new("/wd"), &ctx(), &VarRenderer).unwrap();
        assert_eq!(
            argv,
            vec![
                "docker",
                "run",
                "--rm",
                "-v/wd:/workdir",
                "--workdir",
                "/workdir",
                "alpine:3",
                "sh",
                "-c",
                "make test",
            ]
        );
    }

    #[test]
    fn malformed_shell_line_is_an_error() {
        let spec = CommandSpec::shell("echo 'unterminated");
        assert!(matches!(
            spec.argv(Path::new("/wd"), &ctx(), &VarRenderer),
            Err(Error::ShellSyntax(_))
        ));
    }
}
