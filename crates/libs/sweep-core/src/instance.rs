//! The per-instance lifecycle state machine.
//!
//! One [`JobInstance`] drives a single parameter point through
//! `Pending → Staging → Running → Collecting → Done`, with failure exits
//! from the three working states. The machine is linear; no state is
//! re-entered. A failed instance still persists whatever partial record
//! exists, tagged with the failure stage, so a run can be inspected and
//! selectively re-dispatched.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use sweep_exec::{CommandOutcome, run_command};
use sweep_params::context::LOGDIR_KEY;
use sweep_params::{Context, ParameterPoint, Value};
use sweep_stage::{collect_post, stage_pre};
use sweep_store::{CommandRecord, FailureStage, Outcome, ResultRecord, ResultStore};

use crate::model::{CaseModel, validate_script};
use crate::prelude::*;

/// Bookkeeping subdirectory inside each instance's store area: status,
/// context, run log and command output live here; collected post-files
/// land in the instance directory proper.
const BOOK_DIR: &str = ".sweep";

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Pending,
    Staging,
    Running,
    Collecting,
    Done,
    Failed(FailureStage),
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Pending => write!(f, "pending"),
            InstanceState::Staging => write!(f, "staging"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Collecting => write!(f, "collecting"),
            InstanceState::Done => write!(f, "done"),
            InstanceState::Failed(stage) => write!(f, "failed({stage:?})"),
        }
    }
}

/// The working directory of one instance: exclusively owned, temporary
/// unless the caller asked to keep it.
enum WorkDir {
    Temp(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Temp(dir) => dir.path(),
            WorkDir::Kept(path) => path,
        }
    }
}

/// The runtime unit bound to one parameter point.
pub struct JobInstance<'a> {
    model: &'a CaseModel,
    store: &'a ResultStore,
    point: ParameterPoint,
    ctx: Context,
    state: InstanceState,
    record: ResultRecord,
    script_clean: bool,
}

impl<'a> JobInstance<'a> {
    /// Dispatch a point: create the instance and drive it to a terminal
    /// state. Returns the persisted outcome.
    ///
    /// Only store-level failures (lock timeout, schema conflict) surface
    /// as errors; everything instance-local becomes a `Failed` outcome
    /// with a persisted partial record.
    pub fn execute(
        model: &'a CaseModel,
        store: &'a ResultStore,
        point: ParameterPoint,
        keep_workdir: bool,
        stop: &AtomicBool,
    ) -> Result<Outcome> {
        let mut ctx = point.context();
        let logdir = match model.renderer.render(&model.settings.logdir, &ctx) {
            Ok(logdir) => logdir,
            Err(err) => {
                // Fall back to the ordinal so the failure is still
                // recorded somewhere inspectable.
                warn!(ordinal = point.ordinal(), error = %err, "logdir template failed");
                point.ordinal().to_string()
            }
        };
        ctx.insert(LOGDIR_KEY.to_string(), Value::Str(logdir.clone()));

        let record = ResultRecord::for_point(&point, logdir, Outcome::Done);
        let mut instance = Self {
            model,
            store,
            point,
            ctx,
            state: InstanceState::Pending,
            record,
            script_clean: true,
        };
        instance.record.started = Some(Utc::now());
        instance.run(keep_workdir, stop)
    }

    fn run(&mut self, keep_workdir: bool, stop: &AtomicBool) -> Result<Outcome> {
        // Bookkeeping setup failures are instance-local, like any other
        // staging error.
        let prepared = fs::create_dir_all(self.book_dir())
            .map_err(Error::from)
            .and_then(|()| self.write_context());
        if let Err(err) = prepared {
            return self.fail(FailureStage::Staging, err);
        }

        let workdir = match self.enter_staging(keep_workdir) {
            Ok(workdir) => workdir,
            Err(err) => return self.fail(FailureStage::Staging, err),
        };

        if let Err(err) = self.enter_running(workdir.path(), stop) {
            return self.fail(FailureStage::Running, err);
        }

        if let Err(err) = self.enter_collecting(workdir.path()) {
            return self.fail(FailureStage::Collecting, err);
        }

        self.transition(InstanceState::Done);
        self.finish()
    }

    /// Stage pre-files into a fresh working directory.
    fn enter_staging(&mut self, keep_workdir: bool) -> Result<WorkDir> {
        self.transition(InstanceState::Staging);
        let workdir = if keep_workdir {
            let path = self.instance_dir().join("work");
            fs::create_dir_all(&path)?;
            WorkDir::Kept(path)
        } else {
            WorkDir::Temp(TempDir::new()?)
        };

        let rules =
            self.model
                .pre_files
                .resolve("pre-files", self.point.ordinal(), &self.ctx)?;
        stage_pre(
            &self.model.source_root,
            workdir.path(),
            &rules,
            &self.ctx,
            self.model.renderer.as_ref(),
        )?;
        Ok(workdir)
    }

    /// Run the script. An `Err` return terminates the instance as
    /// `Failed(Running)`; allowed failures only clear `script_clean` and
    /// let the remaining commands proceed.
    fn enter_running(&mut self, workdir: &Path, stop: &AtomicBool) -> Result<()> {
        let script = self
            .model
            .script
            .resolve("script", self.point.ordinal(), &self.ctx)?;
        validate_script(&script, &self.model.reserved_names())?;

        self.transition(InstanceState::Running);
        self.append_run_log(&format!("started={}", Utc::now().to_rfc3339()))?;

        for spec in &script {
            if stop.load(Ordering::Relaxed) {
                warn!(
                    ordinal = self.point.ordinal(),
                    "cancellation requested, aborting remaining commands"
                );
                self.script_clean = false;
                self.append_run_log("success=0")?;
                return Err(Error::Cancelled);
            }

            let outcome = match run_command(
                spec,
                workdir,
                &self.ctx,
                self.model.renderer.as_ref(),
                stop,
            ) {
                Ok(outcome) => outcome,
                Err(err) => {
                    // Process-level execution error: command not found,
                    // permission denied, malformed argv.
                    self.record.commands.push(CommandRecord {
                        name: spec.name.clone(),
                        exit_code: None,
                        wall_time_secs: 0.0,
                        attempts: 0,
                    });
                    self.append_run_log("success=0")?;
                    return Err(err.into());
                }
            };

            self.persist_command_output(&outcome)?;
            self.record.commands.push(CommandRecord {
                name: outcome.name.clone(),
                exit_code: Some(outcome.exit_code),
                wall_time_secs: outcome.wall_time.as_secs_f64(),
                attempts: outcome.attempts,
            });

            // Capture rules operate on stdout only.
            let extraction = spec.captures.extract(&outcome.stdout);
            for failure in &extraction.failures {
                warn!(
                    ordinal = self.point.ordinal(),
                    field = %failure.field,
                    "capture field dropped, value did not parse"
                );
            }
            self.record.captured.extend(extraction.fields);

            if !outcome.success() {
                self.script_clean = false;
                if !spec.allow_failure {
                    self.append_run_log("success=0")?;
                    return Err(Error::CommandFailed {
                        name: spec.name.clone(),
                        code: outcome.exit_code,
                    });
                }
            }
        }

        self.append_run_log(&format!(
            "success={}",
            if self.script_clean { 1 } else { 0 }
        ))?;
        self.append_run_log(&format!("finished={}", Utc::now().to_rfc3339()))?;
        Ok(())
    }

    /// Copy post-files from the working directory into the store.
    fn enter_collecting(&mut self, workdir: &Path) -> Result<()> {
        self.transition(InstanceState::Collecting);
        let rules =
            self.model
                .post_files
                .resolve("post-files", self.point.ordinal(), &self.ctx)?;
        collect_post(
            workdir,
            &self.instance_dir(),
            &rules,
            &self.ctx,
            self.model.renderer.as_ref(),
            self.model.settings.ignore_missing || !self.script_clean,
        )?;
        Ok(())
    }

    /// Terminal failure: tag the record, persist what exists, move on.
    fn fail(&mut self, stage: FailureStage, err: Error) -> Result<Outcome> {
        error!(
            ordinal = self.point.ordinal(),
            stage = ?stage,
            error = %err,
            "instance failed"
        );
        self.transition(InstanceState::Failed(stage));
        self.record.outcome = Outcome::Failed { stage };
        self.finish()
    }

    /// Persist the terminal record. Store-level failures propagate.
    fn finish(&mut self) -> Result<Outcome> {
        self.record.finished = Some(Utc::now());
        self.store.upsert(&self.record)?;
        info!(
            ordinal = self.point.ordinal(),
            state = %self.state,
            "instance finished"
        );
        Ok(self.record.outcome)
    }

    fn transition(&mut self, state: InstanceState) {
        debug!(
            ordinal = self.point.ordinal(),
            from = %self.state,
            to = %state,
            "state transition"
        );
        self.state = state;
        if let Err(err) = fs::write(self.book_dir().join("status.txt"), state.to_string()) {
            warn!(error = %err, "could not persist instance status");
        }
    }

    fn instance_dir(&self) -> PathBuf {
        self.store.instance_dir(&self.record.logdir)
    }

    fn book_dir(&self) -> PathBuf {
        self.instance_dir().join(BOOK_DIR)
    }

    fn write_context(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.ctx)?;
        fs::write(self.book_dir().join("context.json"), json)?;
        Ok(())
    }

    /// Full stdout/stderr are persisted for every command, regardless of
    /// capture rules, for audit and debugging.
    fn persist_command_output(&self, outcome: &CommandOutcome) -> Result<()> {
        let book = self.book_dir();
        fs::write(book.join(format!("{}.stdout", outcome.name)), &outcome.stdout)?;
        fs::write(book.join(format!("{}.stderr", outcome.name)), &outcome.stderr)?;
        self.append_run_log(&format!(
            "walltime_{}={}",
            outcome.name,
            outcome.wall_time.as_secs_f64()
        ))?;
        Ok(())
    }

    fn append_run_log(&self, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.book_dir().join("run.log"))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
