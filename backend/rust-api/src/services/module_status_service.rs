use std::{collections::HashMap, sync::Arc};

use super::{
    hierarchy_fetcher::HierarchyFetcher,
    identifier_resolver::resolve_module_ids,
    module_aggregator::{aggregate_module, ModuleOverride},
    section_requirements::SectionProgressSnapshot,
    store::{RelationalStore, StoreError},
};
use crate::{
    config::LearningPathSettings,
    metrics::MODULE_STATUS_EVALUATIONS_TOTAL,
    models::progress::{ModuleCompletionSummary, SectionRequirementSummary},
};

/// Computes per-module completion for one learner.
pub struct ModuleStatusService {
    store: Arc<dyn RelationalStore>,
    settings: LearningPathSettings,
}

impl ModuleStatusService {
    pub fn new(store: Arc<dyn RelationalStore>, settings: LearningPathSettings) -> Self {
        Self { store, settings }
    }

    /// Statuses keyed by the identifier the caller used (uuid or slug).
    ///
    /// Identifiers that do not resolve to a module are left out of the map.
    pub async fn load_statuses(
        &self,
        user_id: &str,
        requested: Vec<String>,
    ) -> Result<HashMap<String, ModuleCompletionSummary>, StoreError> {
        if requested.is_empty() {
            return Ok(HashMap::new());
        }

        let chunk_size = self.settings.in_chunk_size;
        let resolved = resolve_module_ids(self.store.as_ref(), requested, chunk_size).await;
        if resolved.is_empty() {
            tracing::debug!(user_id = user_id, "No requested module identifiers resolved");
            return Ok(HashMap::new());
        }

        let fetcher = HierarchyFetcher::new(self.store.as_ref(), chunk_size);
        let (overrides, sections) = tokio::join!(
            fetcher.module_overrides(user_id, &resolved.canonical),
            fetcher.sections_for_modules(&resolved.canonical),
        );
        let sections = sections?;

        let section_ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();
        let rows = fetcher.section_progress(user_id, &section_ids).await?;
        let snapshot = SectionProgressSnapshot::from_rows(rows);

        let mut sections_by_module: HashMap<&str, Vec<SectionRequirementSummary>> = HashMap::new();
        for section in &sections {
            sections_by_module
                .entry(section.module_id.as_str())
                .or_default()
                .push(snapshot.evaluate(&section.id));
        }

        let mut statuses = HashMap::new();
        for requested_id in &resolved.requested {
            let Some(module_id) = resolved.canonical_for(requested_id) else {
                continue;
            };
            let module_override = overrides
                .get(module_id)
                .map(|row| ModuleOverride {
                    requirement: row.status,
                    progress: row.progress,
                })
                .unwrap_or_default();
            let module_sections = sections_by_module
                .get(module_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            statuses.insert(
                requested_id.clone(),
                aggregate_module(module_id, module_sections, module_override),
            );
        }

        MODULE_STATUS_EVALUATIONS_TOTAL.inc_by(statuses.len() as u64);
        tracing::debug!(
            user_id = user_id,
            modules = statuses.len(),
            sections = sections.len(),
            "Module statuses computed"
        );

        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;
    use serde_json::json;

    const MODULE: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_rows("modules", vec![json!({"id": MODULE, "slug": "intro"})]);
        store.insert_rows(
            "sections",
            vec![json!({"id": "s1", "module_id": MODULE, "title": "One"})],
        );
        store.insert_rows("lectures", vec![json!({"id": "l1", "section_id": "s1"})]);
        store
    }

    #[tokio::test]
    async fn statuses_are_keyed_by_requested_identifier() {
        let store = seeded_store();
        let service = ModuleStatusService::new(store.clone(), LearningPathSettings::default());

        let statuses = service
            .load_statuses("u1", vec!["intro".into(), "missing-slug".into()])
            .await
            .unwrap();

        assert_eq!(statuses.len(), 1);
        let summary = &statuses["intro"];
        assert_eq!(summary.module_id, MODULE);
        assert_eq!(summary.total_lectures, 1);
        assert!(!summary.completed);
    }

    #[tokio::test]
    async fn nothing_resolved_issues_no_hierarchy_queries() {
        let store = seeded_store();
        let service = ModuleStatusService::new(store.clone(), LearningPathSettings::default());

        let statuses = service
            .load_statuses("u1", vec!["missing-slug".into()])
            .await
            .unwrap();

        assert!(statuses.is_empty());
        assert_eq!(store.query_count("sections"), 0);
    }
}
