//! Single-command execution with retry and failure policy.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use sweep_params::Context;
use sweep_stage::Renderer;

use crate::command::CommandSpec;
use crate::prelude::*;
use crate::process::{spawn_process, wait_with_output};

/// The result of running one command to completion.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Command name, for log file naming.
    pub name: String,
    /// Exit code of the final attempt (-1 when killed by signal).
    pub exit_code: i32,
    /// Full captured stdout of the final attempt.
    pub stdout: String,
    /// Full captured stderr of the final attempt.
    pub stderr: String,
    /// Wall time across all attempts.
    pub wall_time: Duration,
    /// Number of invocations made.
    pub attempts: u32,
}

impl CommandOutcome {
    /// Whether the final attempt exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run one command inside `work_dir`, applying the retry policy.
///
/// Argument interpolation happens once, before the first attempt, using
/// the same point context as staging. A non-zero exit with
/// `retry_on_fail` re-invokes the command immediately and indefinitely;
/// the `stop` flag breaks that loop at the next attempt boundary (an
/// in-flight attempt is never killed here). Stdout and stderr are always
/// captured in full regardless of capture rules.
///
/// Errors are reserved for commands that cannot be run at all; a plain
/// non-zero exit is reported through the outcome so the lifecycle layer
/// can apply the allow-failure policy.
pub fn run_command(
    spec: &CommandSpec,
    work_dir: &Path,
    ctx: &Context,
    renderer: &dyn Renderer,
    stop: &AtomicBool,
) -> Result<CommandOutcome> {
    let argv = spec.argv(work_dir, ctx, renderer)?;
    let cwd = match &spec.workdir {
        Some(dir) => work_dir.join(dir),
        None => work_dir.to_path_buf(),
    };

    let start = Instant::now();
    let mut attempts = 0u32;
    let (status, stdout, stderr) = loop {
        attempts += 1;
        let child = spawn_process(&argv, &spec.env, &cwd).map_err(|source| Error::Spawn {
            command: argv.join(" "),
            source,
        })?;
        let (status, stdout, stderr) = wait_with_output(child)?;

        if !status.success() && spec.retry_on_fail {
            if stop.load(Ordering::Relaxed) {
                warn!(command = %spec.name, "cancellation requested, giving up retries");
                break (status, stdout, stderr);
            }
            info!(command = %spec.name, attempt = attempts, "failed, retrying");
            continue;
        }
        break (status, stdout, stderr);
    };
    let wall_time = start.elapsed();

    let exit_code = status.code().unwrap_or(-1);
    if exit_code == 0 {
        info!(
            command = %spec.name,
            wall_time = ?wall_time,
            "command succeeded"
        );
    } else if spec.allow_failure {
        warn!(command = %spec.name, exit_code, "command failed (allowed)");
    } else {
        error!(command = %spec.name, exit_code, "command failed");
    }

    Ok(CommandOutcome {
        name: spec.name.clone(),
        exit_code,
        stdout,
        stderr,
        wall_time,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_params::Value;
    use sweep_stage::VarRenderer;
    use tempfile::TempDir;

    fn run(spec: &CommandSpec, ctx: &Context) -> Result<CommandOutcome> {
        let work = TempDir::new().unwrap();
        let stop = AtomicBool::new(false);
        run_command(spec, work.path(), ctx, &VarRenderer, &stop)
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let spec = CommandSpec::shell("echo hello ${who}");
        let mut ctx = Context::new();
        ctx.insert("who".into(), Value::Str("world".into()));

        let outcome = run(&spec, &ctx).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout, "hello world\n");
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn nonzero_exit_is_an_outcome_not_an_error() {
        let spec = CommandSpec::exec(vec!["sh".into(), "-c".into(), "exit 3".into()]);
        let outcome = run(&spec, &Context::new()).unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 3);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::shell("definitely-not-a-real-program-xyz");
        assert!(matches!(
            run(&spec, &Context::new()),
            Err(Error::Spawn { .. })
        ));
    }

    #[test]
    fn retry_on_fail_reinvokes_until_success() {
        let work = TempDir::new().unwrap();
        // Fails until the marker file exists, which the command itself
        // creates on its second run.
        let mut spec = CommandSpec::shell("sh -c 'test -f marker || { touch marker; exit 1; }'");
        spec.retry_on_fail = true;

        let stop = AtomicBool::new(false);
        let outcome =
            run_command(&spec, work.path(), &Context::new(), &VarRenderer, &stop).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn stop_flag_breaks_the_retry_loop() {
        let mut spec = CommandSpec::shell("sh -c 'exit 1'");
        spec.retry_on_fail = true;

        let work = TempDir::new().unwrap();
        let stop = AtomicBool::new(true);
        let outcome =
            run_command(&spec, work.path(), &Context::new(), &VarRenderer, &stop).unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn workdir_override_is_relative_to_instance() {
        let work = TempDir::new().unwrap();
        std::fs::create_dir(work.path().join("sub")).unwrap();
        let mut spec = CommandSpec::shell("sh -c 'basename $(pwd)'");
        spec.workdir = Some("sub".into());

        let stop = AtomicBool::new(false);
        let outcome =
            run_command(&spec, work.path(), &Context::new(), &VarRenderer, &stop).unwrap();
        assert_eq!(outcome.stdout.trim_end(), "sub");
    }
}
