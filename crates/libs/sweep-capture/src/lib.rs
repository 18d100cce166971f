//! Typed output capture for the sweep framework.
//!
//! Commands declare capture rules against their stdout: either a regular
//! expression with named groups, or a `(prefix, type, mode)` shorthand
//! that is compiled to an equivalent regex. Each rule produces named,
//! typed fields; an aggregation mode picks the first, last or every
//! occurrence.
//!
//! # Usage
//!
//! ```rust
//! use sweep_capture::{CaptureMode, CaptureRule, CaptureType, RuleSet};
//!
//! let rules = RuleSet::new(vec![
//!     CaptureRule::prefix("norm", "L2 norm", CaptureType::Float, CaptureMode::Last).unwrap(),
//! ])
//! .unwrap();
//!
//! let extraction = rules.extract("L2 norm: 1.5\nL2 norm: 2.5\n");
//! let field = extraction.fields.get("norm").unwrap();
//! assert_eq!(field.as_scalar().unwrap().as_f64(), Some(2.5));
//! ```

pub mod error;
pub mod prelude;
pub mod rule;
pub mod ruleset;

pub use rule::{CaptureMode, CaptureRule, CaptureType};
pub use ruleset::{CapturedValue, Extraction, RuleSet, TypeFailure};
