use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::ThinkerError;

/// A JSON object stored in, or read from, a table.
pub type Document = serde_json::Map<String, Value>;

/// `{database -> {table -> [index names]}}`
pub type SchemaDescription = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
    pub db: String,
    pub table: String,
}

impl TableTarget {
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }
}

/// Equality restriction `document[index] == id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFilter {
    pub index: String,
    pub id: String,
}

impl IndexFilter {
    /// Builds a filter from the optional `<index> <id>` positional pair.
    /// Both or neither must be given.
    pub fn from_args(
        index: Option<String>,
        id: Option<String>,
    ) -> Result<Option<Self>, ThinkerError> {
        match (index, id) {
            (Some(index), Some(id)) if !index.is_empty() && !id.is_empty() => {
                Ok(Some(Self { index, id }))
            }
            (None, None) => Ok(None),
            _ => Err(ThinkerError::ArgumentError(
                "an index requires an id (and vice versa)".to_string(),
            )),
        }
    }
}

/// Old and new value of one row, as returned by change feeds and by writes
/// that ask for `return_changes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub old_val: Option<Value>,
    #[serde(default)]
    pub new_val: Option<Value>,
}

/// Server response to insert/delete/create queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteSummary {
    #[serde(default)]
    pub inserted: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub replaced: u64,
    #[serde(default)]
    pub unchanged: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub first_error: Option<String>,
    #[serde(default)]
    pub generated_keys: Vec<Value>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl WriteSummary {
    /// A write response that reports errors is a failed write.
    pub fn into_result(self) -> Result<Self, ThinkerError> {
        if self.errors > 0 {
            let message = self
                .first_error
                .clone()
                .unwrap_or_else(|| format!("{} write errors", self.errors));
            return Err(ThinkerError::QueryError(message));
        }
        Ok(self)
    }
}
