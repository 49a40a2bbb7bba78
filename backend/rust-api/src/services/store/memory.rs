use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Filter, RelationalStore, SelectQuery, StoreError, MISSING_RELATION_CODE};

/// Store backed by in-process JSON rows.
///
/// Mirrors the PostgREST semantics the service relies on (string comparison
/// for `eq`/`in`, column projection, descending order with nulls last) and
/// records every query so callers can assert on batching.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    failures: HashMap<String, StoreError>,
    query_log: Vec<SelectQuery>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Every subsequent query against `table` fails with `error`.
    pub fn fail_table(&self, table: &str, error: StoreError) {
        self.state().failures.insert(table.to_string(), error);
    }

    /// Simulates a table that has not been migrated yet.
    pub fn drop_table(&self, table: &str) {
        let mut state = self.state();
        state.tables.remove(table);
        state.failures.insert(
            table.to_string(),
            StoreError::api(
                Some(MISSING_RELATION_CODE),
                format!("relation \"public.{}\" does not exist", table),
            ),
        );
    }

    pub fn query_count(&self, table: &str) -> usize {
        self.state()
            .query_log
            .iter()
            .filter(|query| query.table == table)
            .count()
    }

    pub fn queries(&self, table: &str) -> Vec<SelectQuery> {
        self.state()
            .query_log
            .iter()
            .filter(|query| query.table == table)
            .cloned()
            .collect()
    }

    fn check_failure(state: &MemoryState, table: &str) -> Result<(), StoreError> {
        match state.failures.get(table) {
            Some(StoreError::Api { code, message }) => Err(StoreError::Api {
                code: code.clone(),
                message: message.clone(),
            }),
            Some(other) => Err(StoreError::Transport(other.to_string())),
            None => Ok(()),
        }
    }
}

fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, expected) => cell_text(row, column).as_deref() == Some(expected),
        Filter::In(column, values) => cell_text(row, column)
            .map(|actual| values.iter().any(|value| value == &actual))
            .unwrap_or(false),
    })
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut projected = Map::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        projected.insert(
            column.to_string(),
            row.get(column).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(projected)
}

#[async_trait]
impl RelationalStore for InMemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state();
        state.query_log.push(query.clone());
        Self::check_failure(&state, &query.table)?;

        let mut rows: Vec<Value> = state
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(column) = &query.order_desc {
            // Stable sort keeps insertion order among equal keys; nulls last.
            rows.sort_by(|a, b| cell_text(b, column).cmp(&cell_text(a, column)));
        }

        Ok(rows.iter().map(|row| project(row, &query.columns)).collect())
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: &str,
    ) -> Result<Value, StoreError> {
        let mut state = self.state();
        Self::check_failure(&state, table)?;

        let mut row = match row {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::api(
                    Some("22P02"),
                    format!("cannot insert non-object row: {}", other),
                ))
            }
        };
        row.entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let row = Value::Object(row);

        let projected = project(&row, returning);
        state.tables.entry(table.to_string()).or_default().push(row);
        Ok(projected)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state();
        Self::check_failure(&state, table)?;

        let patch = match patch {
            Value::Object(map) => map,
            _ => return Ok(Vec::new()),
        };

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches(row, filters)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(project(row, returning));
            }
        }
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
