use std::{collections::HashMap, sync::Arc};

use super::{
    hierarchy_fetcher::HierarchyFetcher,
    section_requirements::SectionProgressSnapshot,
    store::{RelationalStore, StoreError},
};
use crate::{
    config::LearningPathSettings,
    models::progress::{SectionRequirementSummary, SectionStatusSummary},
};

pub struct SectionStatusService {
    store: Arc<dyn RelationalStore>,
    settings: LearningPathSettings,
}

impl SectionStatusService {
    pub fn new(store: Arc<dyn RelationalStore>, settings: LearningPathSettings) -> Self {
        Self { store, settings }
    }

    /// Statuses keyed by section id; unknown sections are omitted.
    pub async fn load_statuses(
        &self,
        user_id: &str,
        section_ids: Vec<String>,
    ) -> Result<HashMap<String, SectionStatusSummary>, StoreError> {
        if section_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let fetcher = HierarchyFetcher::new(self.store.as_ref(), self.settings.in_chunk_size);
        let sections = fetcher.sections_by_id(&section_ids).await?;
        if sections.is_empty() {
            return Ok(HashMap::new());
        }

        let known_ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();
        let rows = fetcher.section_progress(user_id, &known_ids).await?;
        let snapshot = SectionProgressSnapshot::from_rows(rows);

        Ok(sections
            .into_iter()
            .map(|section| {
                let summary = section_status(
                    section.id.clone(),
                    section.module_id,
                    snapshot.evaluate(&section.id),
                );
                (section.id, summary)
            })
            .collect())
    }
}

/// Applies gate applicability on top of the raw requirement summary.
///
/// Lectures apply when the section has any, exercises when it has questions;
/// the adaptive quiz always applies.
pub fn section_status(
    section_id: String,
    module_id: String,
    requirements: SectionRequirementSummary,
) -> SectionStatusSummary {
    let lectures_applicable = requirements.total_lectures > 0;
    let quiz_applicable = true;
    let exercise_applicable = requirements.exercise_questions_total > 0;

    let gates = [
        (lectures_applicable, requirements.lectures_satisfied),
        (quiz_applicable, requirements.adaptive_satisfied),
        (exercise_applicable, requirements.exercise_satisfied),
    ];
    let total_count = gates.iter().filter(|(applicable, _)| *applicable).count() as u8;
    let met_count = gates
        .iter()
        .filter(|(applicable, satisfied)| *applicable && *satisfied)
        .count() as u8;

    let (completed, progress_percent) = if total_count == 0 {
        (true, 100)
    } else {
        (
            met_count == total_count,
            (f64::from(met_count) / f64::from(total_count) * 100.0).round() as u8,
        )
    };

    SectionStatusSummary {
        section_id,
        module_id,
        requirements,
        lectures_applicable,
        quiz_applicable,
        exercise_applicable,
        met_count,
        total_count,
        completed,
        progress_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_only_needs_the_quiz() {
        let status = section_status(
            "s1".into(),
            "m1".into(),
            SectionRequirementSummary {
                adaptive_satisfied: true,
                ..Default::default()
            },
        );
        assert!(!status.lectures_applicable);
        assert!(!status.exercise_applicable);
        assert_eq!((status.met_count, status.total_count), (1, 1));
        assert!(status.completed);
        assert_eq!(status.progress_percent, 100);
    }

    #[test]
    fn partial_progress_is_rounded() {
        let status = section_status(
            "s1".into(),
            "m1".into(),
            SectionRequirementSummary {
                lectures_satisfied: true,
                total_lectures: 3,
                watched_lectures: 3,
                exercise_questions_total: 4,
                ..Default::default()
            },
        );
        assert_eq!((status.met_count, status.total_count), (1, 3));
        assert_eq!(status.progress_percent, 33);
        assert!(!status.completed);
    }
}
