//! Per-section gate evaluation: lectures watched, adaptive quiz finished,
//! exercise questions answered.
//!
//! Empty content never counts as complete: a section without lectures fails
//! the lecture gate and a section without exercise questions fails the
//! exercise gate.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{
    curriculum::{ExerciseQuestionRow, ExerciseRow, LectureRow},
    progress::{
        AdaptiveSessionRow, ExerciseSubmissionRow, LectureProgressRow, SectionRequirementSummary,
    },
};

type QuestionsByExercise = HashMap<String, HashSet<String>>;

/// Everything needed to evaluate the gates of a set of sections for one learner.
#[derive(Debug, Clone, Default)]
pub struct SectionProgressSnapshot {
    lectures: HashMap<String, HashSet<String>>,
    watched: HashMap<String, HashSet<String>>,
    adaptive_finished: HashSet<String>,
    questions: HashMap<String, QuestionsByExercise>,
    answered: HashMap<String, QuestionsByExercise>,
    last_submitted: HashMap<String, DateTime<Utc>>,
}

/// Raw rows as loaded by the hierarchy fetcher.
#[derive(Debug, Clone, Default)]
pub struct SectionProgressRows {
    pub lectures: Vec<LectureRow>,
    pub exercises: Vec<ExerciseRow>,
    pub questions: Vec<ExerciseQuestionRow>,
    pub watched_lectures: Vec<LectureProgressRow>,
    pub adaptive_sessions: Vec<AdaptiveSessionRow>,
    pub submissions: Vec<ExerciseSubmissionRow>,
}

/// Keeps the most recent submission per (section, exercise, question).
///
/// Newest first; rows without a timestamp sort last.
pub fn latest_submissions(mut rows: Vec<ExerciseSubmissionRow>) -> Vec<ExerciseSubmissionRow> {
    rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| {
            seen.insert((
                row.section_id.clone(),
                row.exercise_id.clone(),
                row.question_id.clone(),
            ))
        })
        .collect()
}

impl SectionProgressSnapshot {
    pub fn from_rows(rows: SectionProgressRows) -> Self {
        let mut snapshot = SectionProgressSnapshot::default();

        for lecture in rows.lectures {
            snapshot
                .lectures
                .entry(lecture.section_id)
                .or_default()
                .insert(lecture.id);
        }

        for progress in rows.watched_lectures {
            snapshot
                .watched
                .entry(progress.section_id)
                .or_default()
                .insert(progress.lecture_id);
        }

        snapshot.adaptive_finished = rows
            .adaptive_sessions
            .into_iter()
            .filter(|session| session.status.satisfies_gate())
            .map(|session| session.section_id)
            .collect();

        let exercise_section: HashMap<String, String> = rows
            .exercises
            .into_iter()
            .map(|exercise| (exercise.id, exercise.section_id))
            .collect();
        for question in rows.questions {
            let Some(section_id) = exercise_section.get(&question.exercise_id) else {
                continue;
            };
            snapshot
                .questions
                .entry(section_id.clone())
                .or_default()
                .entry(question.exercise_id)
                .or_default()
                .insert(question.id);
        }

        for submission in latest_submissions(rows.submissions) {
            if let Some(at) = submission.submitted_at {
                let latest = snapshot
                    .last_submitted
                    .entry(submission.section_id.clone())
                    .or_insert(at);
                if at > *latest {
                    *latest = at;
                }
            }
            snapshot
                .answered
                .entry(submission.section_id)
                .or_default()
                .entry(submission.exercise_id)
                .or_default()
                .insert(submission.question_id);
        }

        snapshot
    }

    pub fn evaluate(&self, section_id: &str) -> SectionRequirementSummary {
        let lectures = self.lectures.get(section_id);
        let total_lectures = count(lectures);
        let watched_lectures = count_watched(lectures, self.watched.get(section_id));
        let exercise_questions_total = count_nested(self.questions.get(section_id));
        let answered_exercise_questions = count_nested(self.answered.get(section_id));

        SectionRequirementSummary {
            lectures_satisfied: total_lectures > 0 && watched_lectures >= total_lectures,
            adaptive_satisfied: self.adaptive_finished.contains(section_id),
            exercise_satisfied: exercise_questions_total > 0
                && answered_exercise_questions >= exercise_questions_total,
            total_lectures,
            watched_lectures,
            exercise_questions_total,
            answered_exercise_questions,
            last_submitted_at: self.last_submitted.get(section_id).copied(),
        }
    }
}

fn count(set: Option<&HashSet<String>>) -> u32 {
    set.map(|s| s.len() as u32).unwrap_or(0)
}

/// Watched rows only count for lectures the section still contains.
fn count_watched(lectures: Option<&HashSet<String>>, watched: Option<&HashSet<String>>) -> u32 {
    match (lectures, watched) {
        (Some(lectures), Some(watched)) => lectures.intersection(watched).count() as u32,
        _ => 0,
    }
}

fn count_nested(by_exercise: Option<&QuestionsByExercise>) -> u32 {
    by_exercise
        .map(|map| map.values().map(|questions| questions.len() as u32).sum())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::progress::AdaptiveSessionStatus;
    use chrono::TimeZone;

    fn lecture(id: &str, section: &str) -> LectureRow {
        LectureRow {
            id: id.into(),
            section_id: section.into(),
        }
    }

    fn watched(section: &str, lecture: &str) -> LectureProgressRow {
        LectureProgressRow {
            section_id: section.into(),
            lecture_id: lecture.into(),
        }
    }

    fn submission(question: &str, at: Option<i64>) -> ExerciseSubmissionRow {
        ExerciseSubmissionRow {
            section_id: "s1".into(),
            exercise_id: "e1".into(),
            question_id: question.into(),
            submitted_at: at.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
        }
    }

    fn exercise_rows() -> (Vec<ExerciseRow>, Vec<ExerciseQuestionRow>) {
        (
            vec![ExerciseRow {
                id: "e1".into(),
                section_id: "s1".into(),
            }],
            vec![
                ExerciseQuestionRow {
                    id: "q1".into(),
                    exercise_id: "e1".into(),
                },
                ExerciseQuestionRow {
                    id: "q2".into(),
                    exercise_id: "e1".into(),
                },
            ],
        )
    }

    #[test]
    fn section_without_lectures_is_not_lecture_satisfied() {
        let snapshot = SectionProgressSnapshot::from_rows(SectionProgressRows::default());
        let summary = snapshot.evaluate("s1");
        assert!(!summary.lectures_satisfied);
        assert!(!summary.exercise_satisfied);
        assert!(!summary.adaptive_satisfied);
        assert_eq!(summary.total_lectures, 0);
    }

    #[test]
    fn all_gates_satisfied() {
        let (exercises, questions) = exercise_rows();
        let snapshot = SectionProgressSnapshot::from_rows(SectionProgressRows {
            lectures: vec![lecture("l1", "s1"), lecture("l2", "s1")],
            watched_lectures: vec![watched("s1", "l1"), watched("s1", "l2"), watched("s1", "l2")],
            adaptive_sessions: vec![AdaptiveSessionRow {
                section_id: "s1".into(),
                status: AdaptiveSessionStatus::Stopped,
            }],
            exercises,
            questions,
            submissions: vec![submission("q1", Some(10)), submission("q2", Some(20))],
        });

        let summary = snapshot.evaluate("s1");
        assert!(summary.all_gates_satisfied());
        assert_eq!(summary.watched_lectures, 2);
        assert_eq!(summary.exercise_questions_total, 2);
        assert_eq!(summary.answered_exercise_questions, 2);
        assert_eq!(
            summary.last_submitted_at,
            Some(Utc.timestamp_opt(20, 0).unwrap())
        );
    }

    #[test]
    fn partially_watched_and_in_progress_quiz_fail_their_gates() {
        let (exercises, questions) = exercise_rows();
        let snapshot = SectionProgressSnapshot::from_rows(SectionProgressRows {
            lectures: vec![lecture("l1", "s1"), lecture("l2", "s1")],
            watched_lectures: vec![watched("s1", "l1")],
            adaptive_sessions: vec![AdaptiveSessionRow {
                section_id: "s1".into(),
                status: AdaptiveSessionStatus::InProgress,
            }],
            exercises,
            questions,
            submissions: vec![submission("q1", Some(5)), submission("q1", Some(9))],
        });

        let summary = snapshot.evaluate("s1");
        assert!(!summary.lectures_satisfied);
        assert!(!summary.adaptive_satisfied);
        assert!(!summary.exercise_satisfied);
        assert_eq!(summary.answered_exercise_questions, 1);
    }

    #[test]
    fn watched_rows_for_removed_lectures_are_ignored() {
        let snapshot = SectionProgressSnapshot::from_rows(SectionProgressRows {
            lectures: vec![lecture("l1", "s1"), lecture("l2", "s1")],
            watched_lectures: vec![watched("s1", "l1"), watched("s1", "l_deleted")],
            ..Default::default()
        });

        let summary = snapshot.evaluate("s1");
        assert_eq!(summary.total_lectures, 2);
        assert_eq!(summary.watched_lectures, 1);
        assert!(!summary.lectures_satisfied);
    }

    #[test]
    fn latest_submission_wins_per_question() {
        let rows = latest_submissions(vec![
            submission("q1", Some(1)),
            submission("q1", None),
            submission("q1", Some(3)),
            submission("q2", None),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question_id, "q1");
        assert_eq!(rows[0].submitted_at, Some(Utc.timestamp_opt(3, 0).unwrap()));
        assert_eq!(rows[1].question_id, "q2");
    }

    #[test]
    fn questions_for_unknown_exercises_are_ignored() {
        let snapshot = SectionProgressSnapshot::from_rows(SectionProgressRows {
            questions: vec![ExerciseQuestionRow {
                id: "q9".into(),
                exercise_id: "orphan".into(),
            }],
            ..Default::default()
        });
        assert_eq!(snapshot.evaluate("s1").exercise_questions_total, 0);
    }
}
