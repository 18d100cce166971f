//! Evolvable column schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use sweep_capture::CapturedValue;
use sweep_params::ValueKind;

use crate::prelude::*;
use crate::record::ResultRecord;

/// Where a column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Parameter,
    Derived,
    Captured,
}

/// Type and role of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Scalar kind of the column's values.
    pub kind: ValueKind,
    /// Whether the column holds an ordered series per record
    /// (capture mode `all`).
    pub series: bool,
    /// Provenance of the column.
    pub role: ColumnRole,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.series {
            write!(f, "[{:?}]", self.kind)
        } else {
            write!(f, "{:?}", self.kind)
        }
    }
}

/// The store's column set. The set may grow across runs (a
/// non-destructive migration); an existing column never changes type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: BTreeMap<String, Column>,
}

impl Schema {
    /// Columns by name.
    pub fn columns(&self) -> &BTreeMap<String, Column> {
        &self.columns
    }

    /// The column set implied by one record.
    pub fn of_record(record: &ResultRecord) -> Self {
        let mut columns = BTreeMap::new();
        for (name, value) in &record.parameters {
            columns.insert(
                name.clone(),
                Column {
                    kind: value.kind(),
                    series: false,
                    role: ColumnRole::Parameter,
                },
            );
        }
        for (name, value) in &record.derived {
            columns.insert(
                name.clone(),
                Column {
                    kind: value.kind(),
                    series: false,
                    role: ColumnRole::Derived,
                },
            );
        }
        for (name, value) in &record.captured {
            let column = match value {
                CapturedValue::Scalar(v) => Column {
                    kind: v.kind(),
                    series: false,
                    role: ColumnRole::Captured,
                },
                CapturedValue::Series(values) => Column {
                    kind: values.first().map(|v| v.kind()).unwrap_or(ValueKind::Str),
                    series: true,
                    role: ColumnRole::Captured,
                },
            };
            columns.insert(name.clone(), column);
        }
        Self { columns }
    }

    /// Merge another schema into this one.
    ///
    /// New columns are added; a column present in both must agree on type
    /// and shape, otherwise the merge is rejected whole. An integer value
    /// arriving in a float column is tolerated (and vice versa widened to
    /// float), since JSON round-trips do not preserve that distinction
    /// for whole numbers.
    pub fn merge(&mut self, other: &Schema) -> Result<()> {
        // Validate before mutating so a rejected merge changes nothing.
        for (name, proposed) in &other.columns {
            if let Some(existing) = self.columns.get(name) {
                if !compatible(existing, proposed) {
                    return Err(Error::Schema {
                        column: name.clone(),
                        existing: existing.to_string(),
                        proposed: proposed.to_string(),
                    });
                }
            }
        }
        for (name, proposed) in &other.columns {
            match self.columns.get_mut(name) {
                None => {
                    self.columns.insert(name.clone(), *proposed);
                }
                Some(existing) => {
                    if existing.kind == ValueKind::Int && proposed.kind == ValueKind::Float {
                        existing.kind = ValueKind::Float;
                    }
                }
            }
        }
        Ok(())
    }
}

fn compatible(existing: &Column, proposed: &Column) -> bool {
    if existing.series != proposed.series || existing.role != proposed.role {
        return false;
    }
    if existing.kind == proposed.kind {
        return true;
    }
    matches!(
        (existing.kind, proposed.kind),
        (ValueKind::Int, ValueKind::Float) | (ValueKind::Float, ValueKind::Int)
    )
}
