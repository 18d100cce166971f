//! Parameter space error types.

/// Parameter space errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A declared parameter has an empty value list.
    #[error("parameter {0:?} has no values")]
    EmptyParameter(String),

    /// The same parameter name was declared twice.
    #[error("parameter {0:?} declared more than once")]
    DuplicateParameter(String),

    /// A sampling generator was asked for zero points.
    #[error("parameter {name:?}: sample count must be at least 1, got {num}")]
    InvalidSampleCount { name: String, num: usize },

    /// A grading factor that cannot produce a finite subdivision.
    #[error("parameter {name:?}: invalid grading factor {grading}")]
    InvalidGrading { name: String, grading: f64 },

    /// A derived-value evaluation failed for one point.
    #[error("failed to evaluate {name:?} at point {ordinal}: {reason}")]
    Evaluation {
        name: String,
        ordinal: u64,
        reason: String,
    },
}
