// In-memory stand-in for a RethinkDB cluster, used by the command tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use svckit::database::{DatabaseConnection, DocumentCursor};
use svckit::errors::ThinkerError;
use svckit::types::{Change, Document, IndexFilter, TableTarget, WriteSummary};

#[derive(Debug, Default)]
pub(crate) struct MemoryTable {
    pub indexes: Vec<String>,
    pub rows: Vec<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub db_creates: usize,
    pub table_creates: usize,
    pub index_creates: usize,
    pub inserts: usize,
}

#[derive(Default)]
struct State {
    databases: BTreeMap<String, BTreeMap<String, MemoryTable>>,
    calls: Calls,
    next_id: u64,
}

#[derive(Default)]
pub(crate) struct MemoryConnection {
    state: Mutex<State>,
    fail_inserts_after: Option<usize>,
    cursor_closes: Arc<AtomicUsize>,
}

impl MemoryConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert calls beyond `count` fail like a rejected write
    pub(crate) fn failing_inserts_after(count: usize) -> Self {
        Self {
            fail_inserts_after: Some(count),
            ..Self::default()
        }
    }

    pub(crate) fn with_table(self, db: &str, table: &str, indexes: &[&str]) -> Self {
        self.state
            .lock()
            .databases
            .entry(db.to_string())
            .or_default()
            .insert(
                table.to_string(),
                MemoryTable {
                    indexes: indexes.iter().map(|i| i.to_string()).collect(),
                    rows: Vec::new(),
                },
            );
        self
    }

    pub(crate) fn with_rows(self, db: &str, table: &str, rows: Vec<Value>) -> Self {
        if let Some(t) = self
            .state
            .lock()
            .databases
            .get_mut(db)
            .and_then(|tables| tables.get_mut(table))
        {
            t.rows.extend(rows);
        }
        self
    }

    pub(crate) fn with_database(self, db: &str) -> Self {
        self.state.lock().databases.entry(db.to_string()).or_default();
        self
    }

    pub(crate) fn rows(&self, db: &str, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|tables| tables.get(table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub(crate) fn indexes(&self, db: &str, table: &str) -> Vec<String> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|tables| tables.get(table))
            .map(|t| t.indexes.clone())
            .unwrap_or_default()
    }

    pub(crate) fn database_count(&self) -> usize {
        self.state.lock().databases.len()
    }

    pub(crate) fn table_count(&self, db: &str) -> usize {
        self.state
            .lock()
            .databases
            .get(db)
            .map(|tables| tables.len())
            .unwrap_or(0)
    }

    /// Number of cursors handed out by `fetch`/`follow` that were closed
    pub(crate) fn cursor_closes(&self) -> usize {
        self.cursor_closes.load(Ordering::SeqCst)
    }

    fn cursor(&self, values: Vec<Value>, feed: bool) -> Box<dyn DocumentCursor> {
        Box::new(VecCursor {
            values: values.into(),
            feed,
            closes: self.cursor_closes.clone(),
        })
    }

    pub(crate) fn calls<R>(&self, f: impl FnOnce(&Calls) -> R) -> R {
        f(&self.state.lock().calls)
    }

    fn matching(state: &State, target: &TableTarget, filter: Option<&IndexFilter>) -> Result<Vec<Value>, ThinkerError> {
        let table = table(state, target)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| matches_filter(row, filter))
            .cloned()
            .collect())
    }
}

fn missing_table(target: &TableTarget) -> ThinkerError {
    ThinkerError::QueryError(format!(
        "runtime error: Table `{}.{}` does not exist.",
        target.db, target.table
    ))
}

fn table<'a>(state: &'a State, target: &TableTarget) -> Result<&'a MemoryTable, ThinkerError> {
    state
        .databases
        .get(&target.db)
        .and_then(|tables| tables.get(&target.table))
        .ok_or_else(|| missing_table(target))
}

fn matches_filter(row: &Value, filter: Option<&IndexFilter>) -> bool {
    match filter {
        Some(filter) => row.get(&filter.index) == Some(&Value::String(filter.id.clone())),
        None => true,
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn list_databases(&self) -> Result<Vec<String>, ThinkerError> {
        Ok(self.state.lock().databases.keys().cloned().collect())
    }

    async fn create_database(&self, db: &str) -> Result<(), ThinkerError> {
        let mut state = self.state.lock();
        if state.databases.contains_key(db) {
            return Err(ThinkerError::QueryError(format!(
                "runtime error: Database `{}` already exists.",
                db
            )));
        }
        state.databases.insert(db.to_string(), BTreeMap::new());
        state.calls.db_creates += 1;
        Ok(())
    }

    async fn list_tables(&self, db: &str) -> Result<Vec<String>, ThinkerError> {
        self.state
            .lock()
            .databases
            .get(db)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| {
                ThinkerError::QueryError(format!("runtime error: Database `{}` does not exist.", db))
            })
    }

    async fn create_table(&self, db: &str, table: &str) -> Result<(), ThinkerError> {
        let mut state = self.state.lock();
        let tables = state.databases.get_mut(db).ok_or_else(|| {
            ThinkerError::QueryError(format!("runtime error: Database `{}` does not exist.", db))
        })?;
        if tables.contains_key(table) {
            return Err(ThinkerError::QueryError(format!(
                "runtime error: Table `{}.{}` already exists.",
                db, table
            )));
        }
        tables.insert(table.to_string(), MemoryTable::default());
        state.calls.table_creates += 1;
        Ok(())
    }

    async fn list_indexes(&self, target: &TableTarget) -> Result<Vec<String>, ThinkerError> {
        let state = self.state.lock();
        Ok(table(&state, target)?.indexes.clone())
    }

    async fn create_index(&self, target: &TableTarget, index: &str) -> Result<(), ThinkerError> {
        let mut state = self.state.lock();
        let table = state
            .databases
            .get_mut(&target.db)
            .and_then(|tables| tables.get_mut(&target.table))
            .ok_or_else(|| missing_table(target))?;
        if table.indexes.iter().any(|i| i == index) {
            return Err(ThinkerError::QueryError(format!(
                "runtime error: Index `{}` already exists.",
                index
            )));
        }
        table.indexes.push(index.to_string());
        state.calls.index_creates += 1;
        Ok(())
    }

    async fn insert(
        &self,
        target: &TableTarget,
        document: &Document,
    ) -> Result<WriteSummary, ThinkerError> {
        let mut state = self.state.lock();
        if let Some(limit) = self.fail_inserts_after {
            if state.calls.inserts >= limit {
                return Err(ThinkerError::QueryError("Duplicate primary key `id`".to_string()));
            }
        }

        state.next_id += 1;
        let id = format!("generated-{}", state.next_id);
        let mut row = document.clone();
        row.entry("id").or_insert_with(|| json!(id));

        let table = state
            .databases
            .get_mut(&target.db)
            .and_then(|tables| tables.get_mut(&target.table))
            .ok_or_else(|| missing_table(target))?;
        table.rows.push(Value::Object(row));
        state.calls.inserts += 1;

        Ok(WriteSummary {
            inserted: 1,
            generated_keys: vec![json!(id)],
            ..Default::default()
        })
    }

    async fn fetch(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError> {
        let state = self.state.lock();
        let rows = Self::matching(&state, target, filter)?;
        Ok(self.cursor(rows, false))
    }

    async fn follow(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError> {
        let state = self.state.lock();
        let changes = Self::matching(&state, target, filter)?
            .into_iter()
            .map(|row| json!({"new_val": row}))
            .collect();
        Ok(self.cursor(changes, true))
    }

    async fn delete(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<WriteSummary, ThinkerError> {
        let mut state = self.state.lock();
        let table = state
            .databases
            .get_mut(&target.db)
            .and_then(|tables| tables.get_mut(&target.table))
            .ok_or_else(|| missing_table(target))?;

        let (deleted, kept): (Vec<Value>, Vec<Value>) = table
            .rows
            .drain(..)
            .partition(|row| matches_filter(row, filter));
        table.rows = kept;

        Ok(WriteSummary {
            deleted: deleted.len() as u64,
            changes: deleted
                .into_iter()
                .map(|row| Change {
                    old_val: Some(row),
                    new_val: None,
                })
                .collect(),
            ..Default::default()
        })
    }

    async fn server_status(&self) -> Result<Vec<Value>, ThinkerError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), ThinkerError> {
        Ok(())
    }

    fn address(&self) -> &str {
        "memory"
    }
}

/// Cursor over values already in memory
struct VecCursor {
    values: VecDeque<Value>,
    feed: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentCursor for VecCursor {
    async fn next(&mut self) -> Option<Result<Value, ThinkerError>> {
        self.values.pop_front().map(Ok)
    }

    async fn close(&mut self) -> Result<(), ThinkerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.values.clear();
        Ok(())
    }

    fn is_feed(&self) -> bool {
        self.feed
    }
}
