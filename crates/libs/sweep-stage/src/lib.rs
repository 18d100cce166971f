//! File staging for the sweep framework.
//!
//! Every job instance runs in an isolated working directory. Before its
//! script starts, input files are copied there from the case source
//! directory, optionally passed through the template renderer; after the
//! script finishes, selected outputs are copied back into the instance's
//! area of the result store.
//!
//! Template rendering itself is a collaborator concern behind the
//! [`Renderer`] trait; the built-in [`VarRenderer`] does plain `${name}`
//! substitution and also serves argument and log-directory interpolation.

pub mod error;
pub mod filemap;
pub mod prelude;
pub mod render;

pub use filemap::{FileMode, FileRule, ResolvedFile, collect_post, resolve, stage_pre};
pub use render::{Renderer, VarRenderer};
