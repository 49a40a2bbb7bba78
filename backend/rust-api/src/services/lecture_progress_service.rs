//! Watched-lecture listing for the lecture player.

use std::sync::Arc;

use serde::Deserialize;

use super::{
    chunked_fetch::dedup_ids,
    store::{fetch_rows, RelationalStore, SelectQuery, StoreError},
};
use crate::models::progress::WatchedLectureRow;

const PROGRESS_TABLE: &str = "user_section_lecture_progress";

/// Optional scope for the listing. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgressFilter {
    pub course_id: Option<String>,
    pub subject_id: Option<String>,
    pub module_id: Option<String>,
}

impl LectureProgressFilter {
    fn apply(&self, mut query: SelectQuery) -> SelectQuery {
        let scopes = [
            ("course_id", &self.course_id),
            ("subject_id", &self.subject_id),
            ("module_id", &self.module_id),
        ];
        for (column, value) in scopes {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                query = query.eq(column, value);
            }
        }
        query
    }
}

pub struct LectureProgressService {
    store: Arc<dyn RelationalStore>,
}

impl LectureProgressService {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Distinct ids of the lectures `user_id` has watched, in store order.
    pub async fn watched_lecture_ids(
        &self,
        user_id: &str,
        filter: &LectureProgressFilter,
    ) -> Result<Vec<String>, StoreError> {
        let query = filter.apply(
            SelectQuery::table(PROGRESS_TABLE)
                .select("lecture_id, module_id, section_id, is_watched")
                .eq("user_id", user_id)
                .eq("is_watched", true),
        );
        let rows: Vec<WatchedLectureRow> = fetch_rows(self.store.as_ref(), &query).await?;

        Ok(dedup_ids(rows.into_iter().filter_map(|row| row.lecture_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;
    use serde_json::json;

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_rows(
            PROGRESS_TABLE,
            vec![
                json!({"user_id": "u1", "course_id": "c1", "module_id": "m1", "lecture_id": "l1", "is_watched": true}),
                json!({"user_id": "u1", "course_id": "c1", "module_id": "m1", "lecture_id": "l1", "is_watched": true}),
                json!({"user_id": "u1", "course_id": "c1", "module_id": "m2", "lecture_id": "l2", "is_watched": true}),
                json!({"user_id": "u1", "course_id": "c1", "module_id": "m2", "lecture_id": "l3", "is_watched": false}),
                json!({"user_id": "u1", "course_id": "c1", "module_id": "m2", "lecture_id": null, "is_watched": true}),
                json!({"user_id": "u2", "course_id": "c1", "module_id": "m1", "lecture_id": "l9", "is_watched": true}),
            ],
        );
        store
    }

    #[tokio::test]
    async fn lists_distinct_watched_lectures() {
        let store = seeded_store();
        let ids = LectureProgressService::new(store.clone())
            .watched_lecture_ids("u1", &LectureProgressFilter::default())
            .await
            .unwrap();

        assert_eq!(ids, vec!["l1", "l2"]);
    }

    #[tokio::test]
    async fn scope_filters_narrow_the_listing() {
        let store = seeded_store();
        let service = LectureProgressService::new(store.clone());

        let filter = LectureProgressFilter {
            course_id: Some("c1".into()),
            module_id: Some("m2".into()),
            subject_id: Some("  ".into()),
        };
        let ids = service.watched_lecture_ids("u1", &filter).await.unwrap();
        assert_eq!(ids, vec!["l2"]);

        let query = store.queries(PROGRESS_TABLE).pop().unwrap();
        let columns: Vec<&str> = query.filters.iter().map(|f| f.column()).collect();
        assert_eq!(columns, vec!["user_id", "is_watched", "course_id", "module_id"]);
    }
}
