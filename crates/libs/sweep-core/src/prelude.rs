//! Common types and utilities.

/// Core error type.
pub use crate::error::Error;

/// Core result type.
pub type Result<T> = core::result::Result<T, Error>;
