//! Run coordination: enumeration, resume, and the worker pool.
//!
//! The coordinator expands the parameter space, filters out points that
//! already completed in a previous run, and feeds the rest through a
//! bounded pool of worker threads. Workers pull from a shared queue and
//! report terminal outcomes back over a channel; a raised stop flag
//! halts dispatch without killing in-flight commands.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};
use std::thread;

use chrono::Utc;
use tracing::{error, info, warn};

use sweep_params::ParameterPoint;
use sweep_params::evaluate::evaluate_point;
use sweep_store::{Outcome, ResultRecord, ResultStore};

use crate::instance::JobInstance;
use crate::model::CaseModel;
use crate::prelude::*;

/// Knobs for one invocation of [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of worker threads. Clamped to at least one.
    pub concurrency: usize,
    /// Re-dispatch points that already have a `Done` record.
    pub force_rerun: bool,
    /// Keep working directories under the instance directory instead of
    /// discarding them.
    pub keep_workdirs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            force_rerun: false,
            keep_workdirs: false,
        }
    }
}

/// Tally of one invocation of [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Points in the parameter space.
    pub total: u64,
    /// Instances that reached `Done` during this invocation.
    pub done: u64,
    /// Instances that terminated in a failure state.
    pub failed: u64,
    /// Points skipped by evaluation policy.
    pub skipped: u64,
    /// Points left untouched because a previous run completed them.
    pub resumed: u64,
}

impl RunSummary {
    /// True when nothing failed. Cancelled runs with no failures still
    /// count as successful.
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Execute the whole parameter space of a model.
///
/// Enumeration, derived-value evaluation and resume filtering happen
/// up front on the calling thread; only instance execution is fanned
/// out to workers. Store-level errors (lock timeout, schema conflict)
/// abort the run; per-instance failures are tallied and the run
/// continues.
pub fn run(model: &CaseModel, options: &RunOptions, stop: &AtomicBool) -> Result<RunSummary> {
    model.validate()?;
    let store = ResultStore::open_with_timeout(
        &model.settings.store_root,
        model.settings.lock_timeout,
    )?;

    let mut summary = RunSummary {
        total: model.space.num_points(),
        ..RunSummary::default()
    };

    let completed = if options.force_rerun {
        BTreeSet::new()
    } else {
        completed_ordinals(&store)?
    };

    let mut pending = VecDeque::new();
    for mut point in model.space.points() {
        if completed.contains(&point.ordinal()) {
            summary.resumed += 1;
            continue;
        }
        if let Some(evaluator) = &model.evaluator {
            let keep = evaluate_point(
                &mut point,
                &model.derived,
                evaluator.as_ref(),
                model.eval_policy,
            )?;
            if !keep {
                persist_skipped(model, &store, &point)?;
                summary.skipped += 1;
                continue;
            }
        }
        pending.push_back(point);
    }

    if summary.resumed > 0 {
        info!(
            resumed = summary.resumed,
            "skipping instances completed by a previous run"
        );
    }
    if pending.is_empty() {
        info!("nothing to dispatch");
        return Ok(summary);
    }

    let workers = options.concurrency.max(1).min(pending.len());
    info!(
        pending = pending.len(),
        workers, "dispatching instances"
    );

    let queue = Mutex::new(pending);
    let (tx, rx) = mpsc::channel::<(u64, Result<Outcome>)>();
    let first_error = Mutex::new(None::<Error>);

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let store = &store;
            let first_error = &first_error;
            scope.spawn(move || {
                worker_loop(model, store, queue, first_error, tx, options.keep_workdirs, stop);
            });
        }
        drop(tx);

        for (ordinal, result) in rx.iter() {
            match result {
                Ok(outcome) => match outcome {
                    Outcome::Done => summary.done += 1,
                    Outcome::Failed { .. } => summary.failed += 1,
                    Outcome::Skipped => summary.skipped += 1,
                },
                Err(err) => {
                    error!(ordinal, error = %err, "aborting run on store failure");
                    record_error(&first_error, err);
                    stop.store(true, Ordering::Relaxed);
                }
            }
        }
    });

    match first_error.into_inner() {
        Ok(Some(err)) => Err(err),
        Ok(None) => {
            info!(
                done = summary.done,
                failed = summary.failed,
                skipped = summary.skipped,
                "run finished"
            );
            Ok(summary)
        }
        Err(_) => Err(Error::WorkerPanic),
    }
}

/// Stash `err` if no earlier error has been recorded.
fn record_error(first_error: &Mutex<Option<Error>>, err: Error) {
    if let Ok(mut slot) = first_error.lock() {
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

fn worker_loop(
    model: &CaseModel,
    store: &ResultStore,
    queue: &Mutex<VecDeque<ParameterPoint>>,
    first_error: &Mutex<Option<Error>>,
    tx: mpsc::Sender<(u64, Result<Outcome>)>,
    keep_workdirs: bool,
    stop: &AtomicBool,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let point = {
            let Ok(mut queue) = queue.lock() else {
                // Queue poisoned by a panicking sibling; record it once
                // and bail.
                record_error(first_error, Error::WorkerPanic);
                return;
            };
            queue.pop_front()
        };
        let Some(point) = point else { return };

        let ordinal = point.ordinal();
        let result = JobInstance::execute(model, store, point, keep_workdirs, stop);
        if tx.send((ordinal, result)).is_err() {
            return;
        }
    }
}

/// Ordinals with a `Done` record in the store.
fn completed_ordinals(store: &ResultStore) -> Result<BTreeSet<u64>> {
    Ok(store
        .records()?
        .iter()
        .filter(|r| r.outcome.is_done())
        .map(|r| r.ordinal)
        .collect())
}

/// Persist a `Skipped` record so the skip survives resume.
fn persist_skipped(model: &CaseModel, store: &ResultStore, point: &ParameterPoint) -> Result<()> {
    warn!(ordinal = point.ordinal(), "point skipped by evaluation policy");
    let ctx = point.context();
    let logdir = model
        .renderer
        .render(&model.settings.logdir, &ctx)
        .unwrap_or_else(|_| point.ordinal().to_string());

    let mut record = ResultRecord::for_point(point, logdir, Outcome::Skipped);
    record.started = Some(Utc::now());
    record.finished = record.started;
    store.upsert(&record)?;
    Ok(())
}
