//! Core error types.

/// Core errors.
///
/// Space-level errors (malformed model, schema conflicts) abort the run
/// before dispatch; instance-local errors terminate only their instance
/// and are recorded in its result record.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Parameter space or evaluation failure.
    #[error(transparent)]
    Params(#[from] sweep_params::error::Error),

    /// Capture rule configuration failure.
    #[error(transparent)]
    Capture(#[from] sweep_capture::error::Error),

    /// Staging or rendering failure.
    #[error(transparent)]
    Stage(#[from] sweep_stage::error::Error),

    /// Command could not be executed.
    #[error(transparent)]
    Exec(#[from] sweep_exec::error::Error),

    /// Result store failure.
    #[error(transparent)]
    Store(#[from] sweep_store::error::Error),

    /// A parameter-dependent spec could not be resolved for a point.
    #[error("failed to resolve {what} for point {ordinal}: {reason}")]
    Resolve {
        what: &'static str,
        ordinal: u64,
        reason: String,
    },

    /// A script command exited non-zero without `allow_failure`.
    #[error("command {name:?} exited with code {code}")]
    CommandFailed { name: String, code: i32 },

    /// The stop flag was raised mid-run.
    #[error("run cancelled")]
    Cancelled,

    /// A worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanic,

    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
