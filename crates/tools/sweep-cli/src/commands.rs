//! Subcommand handlers.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use tracing::info;

use sweep_core::coordinator::{RunOptions, run};
use sweep_core::model::CaseModel;
use sweep_store::{Outcome, ResultStore};

use crate::config::UserConfig;
use crate::prelude::*;

fn load_model(config_path: &Path) -> Result<CaseModel> {
    let config = UserConfig::from_file(config_path)?;
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    config.into_model(base)
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Done => "done",
        Outcome::Failed { stage } => match stage {
            sweep_store::FailureStage::Staging => "failed (staging)",
            sweep_store::FailureStage::Running => "failed (running)",
            sweep_store::FailureStage::Collecting => "failed (collecting)",
        },
        Outcome::Skipped => "skipped",
    }
}

pub fn handle_run(
    config_path: &Path,
    jobs: usize,
    force: bool,
    keep_workdirs: bool,
) -> Result<()> {
    let model = load_model(config_path)?;
    info!(
        points = model.space.num_points(),
        jobs, "starting sweep"
    );

    let options = RunOptions {
        concurrency: jobs,
        force_rerun: force,
        keep_workdirs,
    };
    let stop = AtomicBool::new(false);
    let summary = run(&model, &options, &stop)?;

    println!(
        "{} done, {} failed, {} skipped, {} already complete ({} points total)",
        summary.done, summary.failed, summary.skipped, summary.resumed, summary.total
    );
    if !summary.success() {
        return Err(Error::RunFailed {
            failed: summary.failed,
            total: summary.total,
        });
    }
    Ok(())
}

pub fn handle_status(config_path: &Path) -> Result<()> {
    let model = load_model(config_path)?;
    let store = ResultStore::open_with_timeout(
        &model.settings.store_root,
        model.settings.lock_timeout,
    )?;

    let mut records = store.records()?;
    records.sort_by_key(|r| r.ordinal);
    if records.is_empty() {
        println!("no recorded instances");
        return Ok(());
    }
    for record in records {
        println!(
            "{:>6}  {:<20}  {}",
            record.ordinal,
            outcome_label(&record.outcome),
            record.logdir
        );
    }
    Ok(())
}

pub fn handle_summary(config_path: &Path) -> Result<()> {
    let model = load_model(config_path)?;
    let store = ResultStore::open_with_timeout(
        &model.settings.store_root,
        model.settings.lock_timeout,
    )?;

    let mut records = store.records()?;
    records.sort_by_key(|r| r.ordinal);
    if records.is_empty() {
        println!("no recorded instances");
        return Ok(());
    }

    let schema = store.schema()?;
    let columns: Vec<&String> = schema.columns().keys().collect();

    print!("{:>6}  {:<18}", "index", "status");
    for column in &columns {
        print!("  {column}");
    }
    println!();

    for record in &records {
        print!(
            "{:>6}  {:<18}",
            record.ordinal,
            outcome_label(&record.outcome)
        );
        for column in &columns {
            match record.field(column.as_str()) {
                Some(value) => print!("  {value}"),
                None => print!("  -"),
            }
        }
        println!();
    }

    let done = records.iter().filter(|r| r.outcome.is_done()).count();
    println!("{done} of {} instances done", records.len());
    Ok(())
}
