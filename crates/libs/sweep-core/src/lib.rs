//! Instance lifecycle and run coordination for the sweep framework.
//!
//! This crate ties the leaf crates together: it consumes an
//! already-evaluated case model (the output of an external configuration
//! language), expands its parameter space, and drives each parameter
//! point through the staging → run → collect lifecycle on a bounded
//! worker pool, persisting one result record per instance.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//!
//! use sweep_core::coordinator::{RunOptions, run};
//! use sweep_core::model::CaseModel;
//! use sweep_exec::CommandSpec;
//! use sweep_params::{Parameter, ParameterSpace, Value};
//!
//! let space = ParameterSpace::new(vec![
//!     Parameter::listed("n", vec![Value::Int(1), Value::Int(2)]).unwrap(),
//! ])
//! .unwrap();
//!
//! let mut model = CaseModel::new(space, ".", ".sweepdata");
//! model.script = vec![CommandSpec::shell("echo n=${n}")].into();
//!
//! let stop = AtomicBool::new(false);
//! let summary = run(&model, &RunOptions::default(), &stop).unwrap();
//! assert_eq!(summary.total, 2);
//! ```

pub mod coordinator;
pub mod error;
pub mod instance;
pub mod model;
pub mod prelude;

pub use coordinator::{RunOptions, RunSummary, run};
pub use model::{CaseModel, Resolvable, Settings};
