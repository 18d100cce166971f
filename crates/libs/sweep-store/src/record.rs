//! Persisted result records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sweep_capture::CapturedValue;
use sweep_params::{ParameterPoint, Value};

/// Which lifecycle stage an instance failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Staging,
    Running,
    Collecting,
}

/// Terminal outcome of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Lifecycle ran to completion.
    Done,
    /// Failed at the tagged stage; the record holds whatever was
    /// collected up to that point.
    Failed { stage: FailureStage },
    /// Never executed (evaluation skipped the point).
    Skipped,
}

impl Outcome {
    /// Whether this outcome means the ordinal needs no re-run.
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }
}

/// Per-command execution metadata attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Command name.
    pub name: String,
    /// Exit code of the final attempt, if the command ran at all.
    pub exit_code: Option<i32>,
    /// Wall time across all attempts, in seconds.
    pub wall_time_secs: f64,
    /// Number of invocations made.
    pub attempts: u32,
}

/// One persisted row: everything known about one instance, keyed by its
/// parameter-point ordinal. Upserted whole; a re-run replaces the prior
/// record entirely, so no stale fields linger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Identity key: the point's enumeration ordinal.
    pub ordinal: u64,
    /// Parameter values of the point.
    pub parameters: BTreeMap<String, Value>,
    /// Derived values of the point.
    pub derived: BTreeMap<String, Value>,
    /// Captured fields, merged across the script's commands.
    pub captured: BTreeMap<String, CapturedValue>,
    /// Terminal outcome.
    pub outcome: Outcome,
    /// Per-command metadata, in script order.
    pub commands: Vec<CommandRecord>,
    /// When the instance was dispatched.
    pub started: Option<DateTime<Utc>>,
    /// When the instance reached a terminal state.
    pub finished: Option<DateTime<Utc>>,
    /// Instance log directory, relative to the store root.
    pub logdir: String,
}

impl ResultRecord {
    /// A fresh record for a point, with no execution data yet.
    pub fn for_point(point: &ParameterPoint, logdir: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            ordinal: point.ordinal(),
            parameters: point
                .parameters()
                .iter()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
            derived: point
                .derived()
                .iter()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
            captured: BTreeMap::new(),
            outcome,
            commands: Vec::new(),
            started: None,
            finished: None,
            logdir: logdir.into(),
        }
    }

    /// Scalar view of one field, searching parameters, derived values and
    /// captured fields in that order.
    pub fn field(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.parameters.get(name).or_else(|| self.derived.get(name)) {
            return Some(value.clone());
        }
        self.captured
            .get(name)
            .and_then(CapturedValue::as_scalar)
            .cloned()
    }
}
