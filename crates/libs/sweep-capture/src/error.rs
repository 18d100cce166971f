//! Capture error types.

/// Capture errors. All of these are configuration-class errors raised at
/// load time; type-coercion failures at extraction time are reported as
/// [`TypeFailure`](crate::ruleset::TypeFailure) values instead and never
/// fail the instance.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The rule pattern is not a valid regular expression.
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// A regex rule has no named groups, so it can produce no fields.
    #[error("capture pattern {0:?} has no named groups")]
    NoFields(String),

    /// A field name is not usable as a regex group name.
    #[error("invalid capture field name {0:?}")]
    InvalidFieldName(String),

    /// Two rules in the same set produce the same field.
    #[error("capture field {0:?} produced by more than one rule")]
    FieldCollision(String),
}
