//! Batched `in (...)` lookups.
//!
//! The store caps the size of `in` filters, so id lists are split into chunks
//! of at most `chunk_size`. Chunks are issued concurrently and merged once all
//! of them resolve.

use std::collections::HashSet;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;

use super::store::{fetch_rows, RelationalStore, SelectQuery, StoreError};

/// Splits `items` into consecutive chunks; a zero size means "no chunking".
pub fn chunk_ids<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if chunk_size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(chunk_size).map(<[T]>::to_vec).collect()
}

/// Order-preserving de-duplication.
pub fn dedup_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Fetches every row whose `column` is in `ids`.
///
/// `base` carries the table, projection and any extra filters; the `in`
/// filter is appended per chunk. An empty id list issues no query.
/// A missing relation is treated as an empty table.
pub async fn fetch_in_chunks<T>(
    store: &dyn RelationalStore,
    base: &SelectQuery,
    column: &str,
    ids: &[String],
    chunk_size: usize,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    let ids = dedup_ids(ids.iter().cloned());
    let batches = chunk_ids(&ids, chunk_size);
    if batches.is_empty() {
        return Ok(Vec::new());
    }

    let queries = batches
        .into_iter()
        .map(|chunk| base.clone().in_list(column, chunk))
        .collect::<Vec<_>>();

    let results = try_join_all(queries.iter().map(|query| fetch_rows::<T>(store, query))).await;

    match results {
        Ok(batches) => Ok(batches.into_iter().flatten().collect()),
        Err(err) if err.is_missing_relation() => {
            tracing::warn!(
                table = %base.table,
                "Relation not provisioned yet, treating as empty: {}",
                err
            );
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}
