//! Named value contexts passed to collaborators.

use std::collections::BTreeMap;

use crate::value::Value;

/// A named-argument context: parameter values, derived values and any
/// per-instance metadata, keyed by name.
///
/// Collaborators (template renderers, derived-value evaluators, file and
/// script resolvers) always receive the full context and are free to use
/// any subset of it; the core never introspects which names a collaborator
/// actually needs.
pub type Context = BTreeMap<String, Value>;

/// Ordinal metadata key injected into every instance context.
pub const INDEX_KEY: &str = "_index";

/// Log directory metadata key injected into every instance context.
pub const LOGDIR_KEY: &str = "_logdir";
