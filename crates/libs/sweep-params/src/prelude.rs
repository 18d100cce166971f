//! Common types and utilities.

/// Parameter space error type.
pub use crate::error::Error;

/// Parameter space result type.
pub type Result<T> = core::result::Result<T, Error>;
