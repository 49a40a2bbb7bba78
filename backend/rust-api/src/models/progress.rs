use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{de_id, de_opt_finite, de_opt_id};
use crate::utils::time::de_opt_timestamp;

/// Whether a module blocks sequential progression.
///
/// Resolved once when a row is ingested; anything other than `optional`
/// (missing, empty, unknown) is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleRequirement {
    #[default]
    Mandatory,
    Optional,
}

impl ModuleRequirement {
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            Some(raw) if raw.trim().eq_ignore_ascii_case("optional") => {
                ModuleRequirement::Optional
            }
            _ => ModuleRequirement::Mandatory,
        }
    }

    pub fn is_optional(self) -> bool {
        self == ModuleRequirement::Optional
    }

    pub fn is_mandatory(self) -> bool {
        self == ModuleRequirement::Mandatory
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleRequirement::Mandatory => "mandatory",
            ModuleRequirement::Optional => "optional",
        }
    }
}

impl<'de> Deserialize<'de> for ModuleRequirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(ModuleRequirement::from_raw(
            raw.as_ref().and_then(|value| value.as_str()),
        ))
    }
}

/// Per-learner override row from `user_module_status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserModuleStatusRow {
    #[serde(deserialize_with = "de_id")]
    pub module_id: String,
    #[serde(default)]
    pub status: ModuleRequirement,
    #[serde(default, deserialize_with = "de_opt_finite")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_finite")]
    pub correctness_percentage: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LectureProgressRow {
    #[serde(deserialize_with = "de_id")]
    pub section_id: String,
    #[serde(deserialize_with = "de_id")]
    pub lecture_id: String,
}

/// Watched row as listed back to the player; rows without a lecture id are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchedLectureRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub lecture_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveSessionStatus {
    Completed,
    Stopped,
    #[serde(other)]
    InProgress,
}

impl AdaptiveSessionStatus {
    pub const FINISHED: [&'static str; 2] = ["completed", "stopped"];

    /// Only finished sessions satisfy the adaptive-quiz gate.
    pub fn satisfies_gate(self) -> bool {
        matches!(
            self,
            AdaptiveSessionStatus::Completed | AdaptiveSessionStatus::Stopped
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveSessionRow {
    #[serde(deserialize_with = "de_id")]
    pub section_id: String,
    pub status: AdaptiveSessionStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseSubmissionRow {
    #[serde(deserialize_with = "de_id")]
    pub section_id: String,
    #[serde(deserialize_with = "de_id")]
    pub exercise_id: String,
    #[serde(deserialize_with = "de_id")]
    pub question_id: String,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Gate evaluation for one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequirementSummary {
    pub lectures_satisfied: bool,
    pub adaptive_satisfied: bool,
    pub exercise_satisfied: bool,
    pub total_lectures: u32,
    pub watched_lectures: u32,
    pub exercise_questions_total: u32,
    pub answered_exercise_questions: u32,
    pub last_submitted_at: Option<DateTime<Utc>>,
}

impl SectionRequirementSummary {
    pub fn all_gates_satisfied(&self) -> bool {
        self.lectures_satisfied && self.adaptive_satisfied && self.exercise_satisfied
    }
}

/// Rolled-up completion state for one requested module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletionSummary {
    pub module_id: String,
    pub status: ModuleRequirement,
    pub total_lectures: u32,
    pub watched_lectures: u32,
    pub exercise_questions_total: u32,
    pub answered_exercise_questions: u32,
    pub quiz_completed_sections: u32,
    pub lectures_satisfied: bool,
    pub adaptive_satisfied: bool,
    pub exercise_satisfied: bool,
    pub completed: bool,
    pub lecture_completion_percent: u8,
    pub progress: Option<f64>,
}

/// Section view including which gates apply to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatusSummary {
    pub section_id: String,
    pub module_id: String,
    #[serde(flatten)]
    pub requirements: SectionRequirementSummary,
    pub lectures_applicable: bool,
    pub quiz_applicable: bool,
    pub exercise_applicable: bool,
    pub met_count: u8,
    pub total_count: u8,
    pub completed: bool,
    pub progress_percent: u8,
}
