//! Common types and utilities.

/// Command execution error type.
pub use crate::error::Error;

/// Command execution result type.
pub type Result<T> = core::result::Result<T, Error>;
