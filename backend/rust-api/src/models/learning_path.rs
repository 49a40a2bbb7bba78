//! Persisted learning-path tree: course -> subject -> module -> section.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{de_id, de_opt_order, progress::ModuleRequirement, ser_opt_number};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub courses: Vec<PathCourse>,
}

impl LearningPath {
    pub fn modules(&self) -> impl Iterator<Item = &PathModule> {
        self.courses
            .iter()
            .flat_map(|course| course.subjects.iter())
            .flat_map(|subject| subject.modules.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCourse {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_opt_order",
        serialize_with = "ser_opt_number"
    )]
    pub order_index: Option<f64>,
    pub subjects: Vec<PathSubject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSubject {
    pub id: String,
    pub title: Option<String>,
    pub course_id: String,
    #[serde(
        default,
        deserialize_with = "de_opt_order",
        serialize_with = "ser_opt_number"
    )]
    pub order_index: Option<f64>,
    pub modules: Vec<PathModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathModule {
    pub id: String,
    pub title: Option<String>,
    pub subject_id: String,
    #[serde(
        default,
        deserialize_with = "de_opt_order",
        serialize_with = "ser_opt_number"
    )]
    pub order_index: Option<f64>,
    pub status: ModuleRequirement,
    pub is_mandatory: bool,
    pub correctness_percentage: f64,
    pub last_updated: Option<String>,
    pub completed: bool,
    /// Live progress from `user_module_status`, clamped to 0..=100. Only set
    /// when the path is served, never persisted by generation.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "ser_opt_number"
    )]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ModuleActivity>,
    pub is_active: bool,
    pub active: ActivationState,
    pub sections: Vec<PathSection>,
}

/// Learner activity markers; all three together count as completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleActivity {
    pub viewed_lecture: bool,
    pub attempted_quiz: bool,
    pub attempted_exercise: bool,
}

impl ModuleActivity {
    pub fn is_complete(&self) -> bool {
        self.viewed_lecture && self.attempted_quiz && self.attempted_exercise
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Inactive,
}

impl From<bool> for ActivationState {
    fn from(is_active: bool) -> Self {
        if is_active {
            ActivationState::Active
        } else {
            ActivationState::Inactive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSection {
    pub id: String,
    pub title: Option<String>,
    pub module_id: String,
}

/// Row of `user_learning_path`, returned verbatim by the generate/me endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLearningPathRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub path: Value,
    #[serde(default)]
    pub required: bool,
}
