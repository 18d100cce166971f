//! Staging error types.

use std::path::PathBuf;

/// Staging errors. Any of these on the pre-staging path marks the
/// instance failed before a single command runs.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A mapped source file does not exist.
    #[error("missing staged file: {0}")]
    MissingSource(PathBuf),

    /// A glob pattern could not be parsed.
    #[error("invalid glob pattern {pattern:?}: {source}")]
    BadGlob {
        pattern: String,
        source: glob::PatternError,
    },

    /// Template substitution references a name absent from the context.
    #[error("unknown variable {name:?} in template")]
    UnknownVariable { name: String },

    /// A `${` without a closing brace.
    #[error("unterminated variable reference in template")]
    UnterminatedVariable,

    /// I/O failure while copying or writing.
    #[error(transparent)]
    IO(#[from] std::io::Error),
}
