//! Common types and utilities.

/// Capture error type.
pub use crate::error::Error;

/// Capture result type.
pub type Result<T> = core::result::Result<T, Error>;
