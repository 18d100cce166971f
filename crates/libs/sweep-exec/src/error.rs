//! Command execution error types.

/// Command execution errors.
///
/// A non-zero exit status is not an error here: the runner reports it in
/// the [`CommandOutcome`](crate::runner::CommandOutcome) and the lifecycle
/// layer applies the allow-failure policy. These variants cover the cases
/// where the process could not be run at all.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The command string does not follow shell word rules.
    #[error("malformed command line {0:?}")]
    ShellSyntax(String),

    /// An argument could not be quoted for container wrapping.
    #[error("cannot quote command for container execution: {0}")]
    Quote(#[from] shlex::QuoteError),

    /// Argument or environment interpolation failed.
    #[error(transparent)]
    Render(#[from] sweep_stage::error::Error),

    /// The process could not be started.
    #[error("failed to start {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// I/O failure while monitoring the process.
    #[error(transparent)]
    IO(#[from] std::io::Error),
}
