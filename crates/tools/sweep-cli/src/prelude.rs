//! Common types and utilities.

/// CLI error type.
pub use crate::error::Error;

/// CLI result type.
pub type Result<T> = core::result::Result<T, Error>;
