//! Common types and utilities.

/// Result store error type.
pub use crate::error::Error;

/// Result store result type.
pub type Result<T> = core::result::Result<T, Error>;
