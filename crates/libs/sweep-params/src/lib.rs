//! Parameter space expansion for the sweep framework.
//!
//! A job description declares an ordered set of parameters, each with a
//! finite sequence of values. This crate expands those declarations into
//! the full Cartesian product of concrete parameter points, assigns every
//! point a stable ordinal, and evaluates derived values per point through
//! a caller-supplied [`Evaluator`].
//!
//! # Usage
//!
//! ```rust
//! use sweep_params::{Parameter, ParameterSpace, Value};
//!
//! let space = ParameterSpace::new(vec![
//!     Parameter::listed("degree", vec![Value::Int(1), Value::Int(2)]).unwrap(),
//!     Parameter::uniform("alpha", 0.0, 1.0, 3).unwrap(),
//! ])
//! .unwrap();
//!
//! assert_eq!(space.num_points(), 6);
//! let ordinals: Vec<u64> = space.points().map(|p| p.ordinal()).collect();
//! assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5]);
//! ```

pub mod context;
pub mod error;
pub mod evaluate;
pub mod parameter;
pub mod point;
pub mod prelude;
pub mod value;

pub use context::Context;
pub use evaluate::{EvalPolicy, Evaluator};
pub use parameter::{Parameter, ParameterSpace};
pub use point::ParameterPoint;
pub use value::{Value, ValueKind};
