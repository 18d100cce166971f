//! Common types and utilities.

/// Staging error type.
pub use crate::error::Error;

/// Staging result type.
pub type Result<T> = core::result::Result<T, Error>;
