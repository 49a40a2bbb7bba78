//! Access to the managed relational store (Supabase/Postgres).
//!
//! The service only ever issues filtered `select`s plus the learning-path
//! snapshot `insert`/`update`, so the boundary is deliberately small: a
//! [`SelectQuery`] builder, a [`RelationalStore`] trait and typed row decoding
//! in [`fetch_rows`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::metrics::track_store_query;

pub mod memory;
pub mod postgrest;

pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;

/// SQLSTATE raised by Postgres for `relation "..." does not exist`.
pub const MISSING_RELATION_CODE: &str = "42P01";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store rejected query ({code:?}): {message}")]
    Api {
        code: Option<String>,
        message: String,
    },
    #[error("failed to decode {table} row: {message}")]
    Decode { table: String, message: String },
}

impl StoreError {
    pub fn api(code: Option<&str>, message: impl Into<String>) -> Self {
        StoreError::Api {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The table has not been provisioned yet (schema not migrated).
    pub fn is_missing_relation(&self) -> bool {
        self.code()
            .map(|code| code.trim() == MISSING_RELATION_CODE)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::In(column, _) => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order_desc: Option<String>,
}

impl SelectQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order_desc: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order_desc = Some(column.to_string());
        self
    }
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, StoreError>;

    /// Inserts one row and returns it projected onto `returning`.
    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: &str,
    ) -> Result<Value, StoreError>;

    /// Patches every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Runs `query` and decodes every row into `T`.
///
/// Rows that do not match the expected shape are skipped with a warning so a
/// single bad record cannot take the whole aggregation down.
pub async fn fetch_rows<T>(
    store: &dyn RelationalStore,
    query: &SelectQuery,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    let raw = track_store_query(&query.table, store.select(query)).await?;
    Ok(decode_rows(&query.table, raw))
}

pub fn decode_rows<T>(table: &str, raw: Vec<Value>) -> Vec<T>
where
    T: DeserializeOwned,
{
    let mut rows = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(row) => rows.push(row),
            Err(err) => {
                tracing::warn!(table = table, "Skipping malformed row: {}", err);
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_relation_is_recognised_by_code() {
        let err = StoreError::api(Some(" 42P01 "), "relation \"x\" does not exist");
        assert!(err.is_missing_relation());

        let other = StoreError::api(Some("42501"), "permission denied");
        assert!(!other.is_missing_relation());
        assert!(!StoreError::Transport("timeout".into()).is_missing_relation());
    }

    #[test]
    fn select_query_builder_collects_filters() {
        let query = SelectQuery::table("sections")
            .select("id, module_id")
            .eq("user_id", "u1")
            .in_list("module_id", vec!["a", "b"])
            .order_desc("submitted_at");

        assert_eq!(query.columns, "id, module_id");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].column(), "module_id");
        assert_eq!(query.order_desc.as_deref(), Some("submitted_at"));
    }

    #[test]
    fn decode_rows_skips_malformed_entries() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: String,
        }

        let rows: Vec<Row> = decode_rows(
            "modules",
            vec![
                serde_json::json!({"id": "a"}),
                serde_json::json!({"slug": "missing-id"}),
            ],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }
}
