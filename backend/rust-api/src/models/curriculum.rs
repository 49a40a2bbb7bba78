//! Curriculum rows as read from the store. Authoring happens elsewhere; this
//! service never writes them.

use serde::Deserialize;

use super::{de_id, de_opt_id, de_opt_order};

#[derive(Debug, Clone, Deserialize)]
pub struct CourseAssignmentRow {
    #[serde(deserialize_with = "de_id")]
    pub course_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_order")]
    pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub course_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_order")]
    pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub subject_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_order")]
    pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub module_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LectureRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub section_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub section_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseQuestionRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub exercise_id: String,
}
