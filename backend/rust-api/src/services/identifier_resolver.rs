//! Maps caller-supplied module identifiers (uuid keys or slugs) to canonical ids.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::{
    chunked_fetch::{dedup_ids, fetch_in_chunks},
    store::{RelationalStore, SelectQuery},
};
use crate::models::curriculum::ModuleRow;

lazy_static! {
    static ref UUID_PATTERN: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("uuid pattern is valid");
}

pub fn looks_like_uuid(value: &str) -> bool {
    UUID_PATTERN.is_match(value)
}

/// Trims, stringifies numbers, drops blanks and duplicates (first occurrence wins).
pub fn normalize_requested_ids(values: &[Value]) -> Vec<String> {
    dedup_ids(values.iter().filter_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedModuleIds {
    /// Requested identifiers in request order.
    pub requested: Vec<String>,
    /// Requested identifier -> canonical module id, for the ones that resolved.
    pub canonical_by_requested: HashMap<String, String>,
    /// Distinct canonical ids, in first-seen order.
    pub canonical: Vec<String>,
}

impl ResolvedModuleIds {
    pub fn canonical_for(&self, requested: &str) -> Option<&str> {
        self.canonical_by_requested.get(requested).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Builds the mapping from already-known slug matches; pure.
pub fn build_resolution(
    requested: Vec<String>,
    slug_matches: &HashMap<String, String>,
) -> ResolvedModuleIds {
    let mut canonical_by_requested = HashMap::new();
    for id in &requested {
        if let Some(actual) = slug_matches.get(id) {
            canonical_by_requested.insert(id.clone(), actual.clone());
        } else if looks_like_uuid(id) {
            canonical_by_requested.insert(id.clone(), id.clone());
        }
    }

    let canonical = dedup_ids(
        requested
            .iter()
            .filter_map(|id| canonical_by_requested.get(id))
            .filter(|id| looks_like_uuid(id))
            .cloned(),
    );
    canonical_by_requested.retain(|_, actual| looks_like_uuid(actual));

    ResolvedModuleIds {
        requested,
        canonical_by_requested,
        canonical,
    }
}

/// Resolves non-uuid inputs through `modules.slug`.
///
/// Unmatched slugs are dropped from the canonical set without error; a failing
/// slug lookup is logged and leaves every slug unresolved.
pub async fn resolve_module_ids(
    store: &dyn RelationalStore,
    requested: Vec<String>,
    chunk_size: usize,
) -> ResolvedModuleIds {
    let slug_candidates: Vec<String> = requested
        .iter()
        .filter(|id| !looks_like_uuid(id))
        .cloned()
        .collect();

    let mut slug_matches = HashMap::new();
    if !slug_candidates.is_empty() {
        match fetch_in_chunks::<ModuleRow>(
            store,
            &SelectQuery::table("modules").select("id, slug"),
            "slug",
            &slug_candidates,
            chunk_size,
        )
        .await
        {
            Ok(rows) => {
                for row in rows {
                    if let Some(slug) = row.slug.filter(|slug| !slug.is_empty()) {
                        slug_matches.insert(slug, row.id);
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Skipping slug to module mapping: {}", err);
            }
        }
    }

    build_resolution(requested, &slug_matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{InMemoryStore, StoreError};
    use serde_json::json;

    const M1: &str = "11111111-1111-4111-8111-111111111111";
    const M2: &str = "22222222-2222-4222-8222-222222222222";

    #[test]
    fn uuid_detection() {
        assert!(looks_like_uuid(M1));
        assert!(looks_like_uuid("550E8400-E29B-41D4-A716-446655440000"));
        assert!(!looks_like_uuid("intro-to-python"));
        assert!(!looks_like_uuid("11111111111141118111111111111111"));
    }

    #[test]
    fn normalization_trims_and_dedups() {
        let ids = normalize_requested_ids(&[
            json!("  intro "),
            json!(42),
            json!("intro"),
            json!(""),
            json!(null),
            json!({"id": "x"}),
        ]);
        assert_eq!(ids, vec!["intro".to_string(), "42".to_string()]);
    }

    #[tokio::test]
    async fn slugs_resolve_and_unknown_slugs_are_dropped() {
        let store = InMemoryStore::new();
        store.insert_rows(
            "modules",
            vec![json!({"id": M2, "slug": "loops"}), json!({"id": M1, "slug": "intro"})],
        );

        let resolved = resolve_module_ids(
            &store,
            vec![
                "loops".to_string(),
                M1.to_string(),
                "intro".to_string(),
                "mod-slug-that-does-not-exist".to_string(),
            ],
            90,
        )
        .await;

        assert_eq!(resolved.canonical, vec![M2.to_string(), M1.to_string()]);
        assert_eq!(resolved.canonical_for("intro"), Some(M1));
        assert_eq!(resolved.canonical_for(M1), Some(M1));
        assert_eq!(resolved.canonical_for("mod-slug-that-does-not-exist"), None);
        assert_eq!(resolved.requested.len(), 4);
    }

    #[tokio::test]
    async fn failed_slug_lookup_keeps_uuid_inputs() {
        let store = InMemoryStore::new();
        store.fail_table("modules", StoreError::Transport("connection reset".into()));

        let resolved =
            resolve_module_ids(&store, vec!["intro".to_string(), M1.to_string()], 90).await;
        assert_eq!(resolved.canonical, vec![M1.to_string()]);
        assert_eq!(resolved.canonical_for("intro"), None);
    }

    #[tokio::test]
    async fn only_uuids_skip_the_slug_query() {
        let store = InMemoryStore::new();
        let resolved = resolve_module_ids(&store, vec![M1.to_string()], 90).await;
        assert!(!resolved.is_empty());
        assert_eq!(store.query_count("modules"), 0);
    }
}
