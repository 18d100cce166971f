//! The result store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use sweep_params::Value;

use crate::lock::StoreLock;
use crate::prelude::*;
use crate::record::{Outcome, ResultRecord};
use crate::schema::Schema;

const RECORDS_FILE: &str = "records.json";
const SCHEMA_FILE: &str = "schema.json";
const LOCK_FILE: &str = "lockfile";

/// Default bounded wait for the cross-process lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A query filter over the store.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Keep only records with this outcome.
    pub outcome: Option<Outcome>,
    /// Keep only records whose named field equals the given value.
    /// Matches parameters, derived values and scalar captured fields.
    pub fields: Vec<(String, Value)>,
}

impl Filter {
    fn matches(&self, record: &ResultRecord) -> bool {
        if let Some(outcome) = &self.outcome {
            if record.outcome != *outcome {
                return false;
            }
        }
        self.fields
            .iter()
            .all(|(name, want)| record.field(name).as_ref() == Some(want))
    }
}

/// Handle to a result store rooted at a directory.
///
/// Cheap to clone; every operation re-acquires the advisory lock for its
/// own narrow critical section, so independent processes (and worker
/// threads sharing one handle) interleave safely.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl ResultStore {
    /// Open (creating if necessary) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_timeout(root, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open with an explicit lock timeout.
    pub fn open_with_timeout(root: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, lock_timeout })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The per-instance file area for a log directory name.
    pub fn instance_dir(&self, logdir: &str) -> PathBuf {
        self.root.join(logdir)
    }

    /// Insert or replace the record for an ordinal.
    ///
    /// Holds the exclusive lock only around read-merge-write; the
    /// expensive part of the work (running the job) never holds it.
    /// The prior record for the ordinal, if any, is replaced entirely.
    pub fn upsert(&self, record: &ResultRecord) -> Result<()> {
        let _lock = StoreLock::exclusive(&self.root.join(LOCK_FILE), self.lock_timeout)?;

        let mut schema = self.read_schema()?;
        schema.merge(&Schema::of_record(record))?;

        let mut records = self.read_records()?;
        records.insert(record.ordinal, record.clone());

        self.commit(SCHEMA_FILE, &schema)?;
        self.commit(RECORDS_FILE, &records)?;
        debug!(ordinal = record.ordinal, "record upserted");
        Ok(())
    }

    /// All records, in ordinal order.
    pub fn records(&self) -> Result<Vec<ResultRecord>> {
        let _lock = StoreLock::shared(&self.root.join(LOCK_FILE), self.lock_timeout)?;
        Ok(self.read_records()?.into_values().collect())
    }

    /// Records matching a filter, in ordinal order.
    pub fn query(&self, filter: &Filter) -> Result<Vec<ResultRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// The recorded outcome for an ordinal, if any. Used for resume
    /// decisions.
    pub fn outcome_of(&self, ordinal: u64) -> Result<Option<Outcome>> {
        let _lock = StoreLock::shared(&self.root.join(LOCK_FILE), self.lock_timeout)?;
        Ok(self.read_records()?.get(&ordinal).map(|r| r.outcome))
    }

    /// The current column schema.
    pub fn schema(&self) -> Result<Schema> {
        let _lock = StoreLock::shared(&self.root.join(LOCK_FILE), self.lock_timeout)?;
        self.read_schema()
    }

    fn read_records(&self) -> Result<BTreeMap<u64, ResultRecord>> {
        read_json_or_default(&self.root.join(RECORDS_FILE))
    }

    fn read_schema(&self) -> Result<Schema> {
        read_json_or_default(&self.root.join(SCHEMA_FILE))
    }

    /// Write a JSON document via a temp file and atomic rename, so a
    /// reader never observes a partially written file.
    fn commit<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, data)?;
        tmp.write_all(b"\n")?;
        tmp.persist(self.root.join(name))?;
        Ok(())
    }
}

fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CommandRecord, FailureStage};
    use sweep_capture::CapturedValue;
    use sweep_params::{Parameter, ParameterSpace};
    use tempfile::TempDir;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::listed("n", vec![Value::Int(1), Value::Int(2)]).unwrap(),
        ])
        .unwrap()
    }

    fn record(ordinal: u64) -> ResultRecord {
        let point = space().point_at(ordinal).unwrap();
        let mut record = ResultRecord::for_point(&point, ordinal.to_string(), Outcome::Done);
        record.captured.insert(
            "norm".into(),
            CapturedValue::Scalar(Value::Float(0.5 + ordinal as f64)),
        );
        record.commands.push(CommandRecord {
            name: "solve".into(),
            exit_code: Some(0),
            wall_time_secs: 0.1,
            attempts: 1,
        });
        record
    }

    #[test]
    fn upsert_then_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.upsert(&record(0)).unwrap();
        store.upsert(&record(1)).unwrap();

        let all = store.records().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].ordinal, 0);
        assert_eq!(all[1].ordinal, 1);
        assert_eq!(store.outcome_of(1).unwrap(), Some(Outcome::Done));
        assert_eq!(store.outcome_of(7).unwrap(), None);
    }

    #[test]
    fn upsert_replaces_whole_record() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();

        let mut stale = record(0);
        stale
            .captured
            .insert("leftover".into(), CapturedValue::Scalar(Value::Float(9.0)));
        store.upsert(&stale).unwrap();

        store.upsert(&record(0)).unwrap();
        let fresh = &store.records().unwrap()[0];
        // No stale fields linger after the overwrite.
        assert!(!fresh.captured.contains_key("leftover"));
        assert!(fresh.captured.contains_key("norm"));
    }

    #[test]
    fn query_filters_by_outcome_and_field() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.upsert(&record(0)).unwrap();
        let mut failed = record(1);
        failed.outcome = Outcome::Failed {
            stage: FailureStage::Running,
        };
        store.upsert(&failed).unwrap();

        let done = store
            .query(&Filter {
                outcome: Some(Outcome::Done),
                fields: vec![],
            })
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ordinal, 0);

        let by_param = store
            .query(&Filter {
                outcome: None,
                fields: vec![("n".into(), Value::Int(2))],
            })
            .unwrap();
        assert_eq!(by_param.len(), 1);
        assert_eq!(by_param[0].ordinal, 1);
    }

    #[test]
    fn incompatible_record_is_rejected_and_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.upsert(&record(0)).unwrap();

        let mut retyped = record(1);
        retyped
            .captured
            .insert("norm".into(), CapturedValue::Scalar(Value::Str("x".into())));
        assert!(matches!(
            store.upsert(&retyped),
            Err(Error::Schema { .. })
        ));
        // The failed upsert left no trace.
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn schema_tracks_roles() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.upsert(&record(0)).unwrap();

        let schema = store.schema().unwrap();
        use crate::schema::ColumnRole;
        assert_eq!(
            schema.columns().get("n").unwrap().role,
            ColumnRole::Parameter
        );
        assert_eq!(
            schema.columns().get("norm").unwrap().role,
            ColumnRole::Captured
        );
    }
}
