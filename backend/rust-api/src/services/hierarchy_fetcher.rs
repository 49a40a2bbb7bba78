//! Loads the module -> section -> lecture / exercise -> question hierarchy and
//! the learner's progress rows, in chunked batches.

use std::collections::HashMap;

use super::{
    chunked_fetch::fetch_in_chunks,
    section_requirements::SectionProgressRows,
    store::{RelationalStore, SelectQuery, StoreError},
};
use crate::models::{
    curriculum::{ExerciseQuestionRow, ExerciseRow, LectureRow, SectionRow},
    progress::{
        AdaptiveSessionRow, AdaptiveSessionStatus, ExerciseSubmissionRow, LectureProgressRow,
        UserModuleStatusRow,
    },
};

pub struct HierarchyFetcher<'a> {
    store: &'a dyn RelationalStore,
    chunk_size: usize,
}

impl<'a> HierarchyFetcher<'a> {
    pub fn new(store: &'a dyn RelationalStore, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    pub async fn sections_for_modules(
        &self,
        module_ids: &[String],
    ) -> Result<Vec<SectionRow>, StoreError> {
        fetch_in_chunks(
            self.store,
            &SelectQuery::table("sections").select("id, module_id, title"),
            "module_id",
            module_ids,
            self.chunk_size,
        )
        .await
    }

    pub async fn sections_by_id(
        &self,
        section_ids: &[String],
    ) -> Result<Vec<SectionRow>, StoreError> {
        fetch_in_chunks(
            self.store,
            &SelectQuery::table("sections").select("id, module_id, title"),
            "id",
            section_ids,
            self.chunk_size,
        )
        .await
    }

    async fn by_section<T>(
        &self,
        base: &SelectQuery,
        section_ids: &[String],
    ) -> Result<Vec<T>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        fetch_in_chunks(self.store, base, "section_id", section_ids, self.chunk_size).await
    }

    /// Per-learner override rows keyed by module id.
    ///
    /// Lookup failures are logged and read as "no overrides".
    pub async fn module_overrides(
        &self,
        user_id: &str,
        module_ids: &[String],
    ) -> HashMap<String, UserModuleStatusRow> {
        let result = fetch_in_chunks::<UserModuleStatusRow>(
            self.store,
            &SelectQuery::table("user_module_status")
                .select("module_id, status, progress")
                .eq("user_id", user_id),
            "module_id",
            module_ids,
            self.chunk_size,
        )
        .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .map(|row| (row.module_id.clone(), row))
                .collect(),
            Err(err) => {
                tracing::warn!(user_id = user_id, "User module status lookup failed: {}", err);
                HashMap::new()
            }
        }
    }

    /// Content and progress rows for `section_ids`.
    ///
    /// Independent resources load concurrently; exercise questions follow once
    /// the exercise ids are known. Any failure other than a missing relation
    /// aborts the whole load.
    pub async fn section_progress(
        &self,
        user_id: &str,
        section_ids: &[String],
    ) -> Result<SectionProgressRows, StoreError> {
        if section_ids.is_empty() {
            return Ok(SectionProgressRows::default());
        }

        let lectures_query = SelectQuery::table("lectures").select("id, section_id");
        let exercises_query = SelectQuery::table("section_exercises").select("id, section_id");
        let watched_query = SelectQuery::table("user_section_lecture_progress")
            .select("section_id, lecture_id")
            .eq("user_id", user_id)
            .eq("is_watched", true);
        let adaptive_query = SelectQuery::table("adaptive_quiz_sessions")
            .select("section_id, status")
            .eq("user_id", user_id)
            .in_list("status", AdaptiveSessionStatus::FINISHED);
        let submissions_query = SelectQuery::table("user_section_exercise_submissions")
            .select("section_id, exercise_id, question_id, submitted_at")
            .eq("user_id", user_id)
            .order_desc("submitted_at");

        let (lectures, exercises, watched_lectures, adaptive_sessions, submissions) = tokio::try_join!(
            self.by_section::<LectureRow>(&lectures_query, section_ids),
            self.by_section::<ExerciseRow>(&exercises_query, section_ids),
            self.by_section::<LectureProgressRow>(&watched_query, section_ids),
            self.by_section::<AdaptiveSessionRow>(&adaptive_query, section_ids),
            self.by_section::<ExerciseSubmissionRow>(&submissions_query, section_ids),
        )?;

        let exercise_ids: Vec<String> = exercises.iter().map(|e| e.id.clone()).collect();
        let questions = fetch_in_chunks::<ExerciseQuestionRow>(
            self.store,
            &SelectQuery::table("section_exercise_questions").select("id, exercise_id"),
            "exercise_id",
            &exercise_ids,
            self.chunk_size,
        )
        .await?;

        tracing::debug!(
            sections = section_ids.len(),
            lectures = lectures.len(),
            exercises = exercises.len(),
            questions = questions.len(),
            submissions = submissions.len(),
            "Loaded section hierarchy"
        );

        Ok(SectionProgressRows {
            lectures,
            exercises,
            questions,
            watched_lectures,
            adaptive_sessions,
            submissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn progress_rows_are_scoped_to_the_learner() {
        let store = InMemoryStore::new();
        store.insert_rows(
            "user_section_lecture_progress",
            vec![
                json!({"user_id": "u1", "section_id": "s1", "lecture_id": "l1", "is_watched": true}),
                json!({"user_id": "u1", "section_id": "s1", "lecture_id": "l2", "is_watched": false}),
                json!({"user_id": "u2", "section_id": "s1", "lecture_id": "l2", "is_watched": true}),
            ],
        );
        store.insert_rows(
            "adaptive_quiz_sessions",
            vec![
                json!({"user_id": "u1", "section_id": "s1", "status": "in_progress"}),
                json!({"user_id": "u1", "section_id": "s2", "status": "completed"}),
            ],
        );

        let fetcher = HierarchyFetcher::new(&store, 90);
        let rows = fetcher
            .section_progress("u1", &["s1".to_string(), "s2".to_string()])
            .await
            .unwrap();

        assert_eq!(rows.watched_lectures.len(), 1);
        assert_eq!(rows.watched_lectures[0].lecture_id, "l1");
        assert_eq!(rows.adaptive_sessions.len(), 1);
        assert_eq!(rows.adaptive_sessions[0].section_id, "s2");
        // no exercises -> no question lookup
        assert_eq!(store.query_count("section_exercise_questions"), 0);
    }

    #[tokio::test]
    async fn override_failure_reads_as_no_overrides() {
        let store = InMemoryStore::new();
        store.fail_table(
            "user_module_status",
            StoreError::api(Some("42501"), "permission denied"),
        );
        let fetcher = HierarchyFetcher::new(&store, 90);
        let overrides = fetcher.module_overrides("u1", &["m1".to_string()]).await;
        assert!(overrides.is_empty());
    }
}
