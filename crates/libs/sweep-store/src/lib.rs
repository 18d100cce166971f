//! Durable result persistence for the sweep framework.
//!
//! A result store is a directory: structured records keyed by instance
//! ordinal in `records.json`, an evolvable column schema in
//! `schema.json`, a `lockfile` for cross-process mutual exclusion, and
//! one subdirectory per instance holding its command logs and collected
//! post-files.
//!
//! Multiple independent run invocations may target the same store. All
//! mutation goes through [`ResultStore::upsert`], which holds an
//! exclusive advisory lock only around the read-merge-write step; readers
//! take the same lock shared and observe either a fully committed write
//! or none.

pub mod error;
pub mod lock;
pub mod prelude;
pub mod record;
pub mod schema;
pub mod store;

pub use lock::StoreLock;
pub use record::{CommandRecord, FailureStage, Outcome, ResultRecord};
pub use schema::{Column, ColumnRole, Schema};
pub use store::{Filter, ResultStore};
