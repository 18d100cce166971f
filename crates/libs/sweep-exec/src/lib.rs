//! Command execution for the sweep framework.
//!
//! Runs one external command at a time inside an instance working
//! directory: argument interpolation against the point context, optional
//! container wrapping, full stdout/stderr capture, and the
//! allow-failure/retry policy evaluated after every attempt.
//!
//! Commands within one instance's script always execute strictly
//! sequentially; later commands may depend on files written by earlier
//! ones.

pub mod command;
pub mod error;
pub mod prelude;
pub mod process;
pub mod runner;

pub use command::{Args, CommandSpec, Container};
pub use runner::{CommandOutcome, run_command};
