//! Learning-path generation and persistence.
//!
//! The tree is built from the learner's course assignments, or from their
//! `user_module_status` rows when they have none, and stored as a single
//! `user_learning_path` row per learner. Serving a path overlays the
//! learner's live `user_module_status` onto the stored tree.

use std::{collections::HashMap, sync::Arc};

use serde_json::json;

use super::{
    activation::{activate, apply_activation, ensure_first_module_active, sort_by_order},
    chunked_fetch::{dedup_ids, fetch_in_chunks},
    store::{decode_rows, fetch_rows, Filter, RelationalStore, SelectQuery, StoreError},
};
use crate::{
    config::LearningPathSettings,
    metrics::{track_store_query, LEARNING_PATHS_GENERATED_TOTAL},
    models::{
        curriculum::{CourseAssignmentRow, CourseRow, ModuleRow, SectionRow, SubjectRow},
        learning_path::{
            ActivationState, LearningPath, PathCourse, PathModule, PathSection, PathSubject,
            UserLearningPathRow,
        },
        progress::UserModuleStatusRow,
    },
};

const PATH_TABLE: &str = "user_learning_path";
const PATH_COLUMNS: &str = "id, path, required";
const STATUS_TABLE: &str = "user_module_status";
const STATUS_COLUMNS: &str = "module_id, status, correctness_percentage, progress, last_updated";

/// How a `generate` call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    Existing,
    Created,
    Refreshed,
}

impl GenerateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerateOutcome::Existing => "existing",
            GenerateOutcome::Created => "created",
            GenerateOutcome::Refreshed => "refreshed",
        }
    }
}

/// Raw rows the tree is assembled from.
#[derive(Debug, Default)]
struct PathRows {
    courses: Vec<CourseRow>,
    subjects: Vec<SubjectRow>,
    modules: Vec<ModuleRow>,
    statuses: Vec<UserModuleStatusRow>,
    sections: Vec<SectionRow>,
}

pub struct LearningPathService {
    store: Arc<dyn RelationalStore>,
    settings: LearningPathSettings,
}

impl LearningPathService {
    pub fn new(store: Arc<dyn RelationalStore>, settings: LearningPathSettings) -> Self {
        Self { store, settings }
    }

    /// The learner's persisted path row, if one has been generated.
    pub async fn load_stored(
        &self,
        user_id: &str,
    ) -> Result<Option<UserLearningPathRow>, StoreError> {
        let query = SelectQuery::table(PATH_TABLE)
            .select(PATH_COLUMNS)
            .eq("user_id", user_id);
        let mut rows: Vec<UserLearningPathRow> = fetch_rows(self.store.as_ref(), &query).await?;

        if rows.len() > 1 {
            tracing::warn!(
                user_id = user_id,
                rows = rows.len(),
                "Multiple learning paths stored for learner, using the first"
            );
        }
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Returns the stored path, building and persisting one first when none
    /// exists or `refresh` is set.
    ///
    /// The existence check and the insert are two separate store calls with
    /// no uniqueness guarantee in between: concurrent first-time calls for the
    /// same learner can both insert.
    pub async fn generate(
        &self,
        user_id: &str,
        refresh: bool,
    ) -> Result<(UserLearningPathRow, GenerateOutcome), StoreError> {
        let existing = self.load_stored(user_id).await?;

        let (row, outcome) = match existing {
            Some(row) if !refresh => (row, GenerateOutcome::Existing),
            Some(row) => {
                let path = self.build_path(user_id).await?;
                let updated = self.update_path(&row.id, &path).await?;
                (updated, GenerateOutcome::Refreshed)
            }
            None => {
                let path = self.build_path(user_id).await?;
                let inserted = self.insert_path(user_id, &path).await?;
                (inserted, GenerateOutcome::Created)
            }
        };

        LEARNING_PATHS_GENERATED_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
        tracing::info!(
            user_id = user_id,
            path_id = %row.id,
            outcome = outcome.as_str(),
            "Learning path generated"
        );

        Ok((row, outcome))
    }

    /// Builds the annotated course tree for `user_id` without persisting it.
    pub async fn build_path(&self, user_id: &str) -> Result<LearningPath, StoreError> {
        let course_ids = self.assigned_course_ids(user_id).await?;
        let rows = if course_ids.is_empty() {
            tracing::debug!(user_id = user_id, "No course assignments, using module status rows");
            self.rows_from_module_status(user_id).await?
        } else {
            self.rows_from_assignments(user_id, &course_ids).await?
        };

        Ok(assemble_path(rows))
    }

    /// The path served to the learner.
    ///
    /// A stored path gets live progress and correctness overlaid but keeps its
    /// stored activation, except that optional modules and the first module of
    /// each subject are always active. Without a readable stored path the tree
    /// is computed from the course assignments and nothing is persisted.
    /// `None` means the learner has no path and no assignments.
    pub async fn load_for_learner(
        &self,
        user_id: &str,
    ) -> Result<Option<LearningPath>, StoreError> {
        match self.load_stored(user_id).await {
            Ok(Some(row)) => match serde_json::from_value::<LearningPath>(row.path) {
                Ok(path) => {
                    let module_ids = dedup_ids(path.modules().map(|m| m.id.clone()));
                    let statuses = self.live_statuses(user_id, &module_ids).await;
                    return Ok(Some(overlay_stored_path(path, &statuses)));
                }
                Err(err) => tracing::warn!(
                    user_id = user_id,
                    path_id = %row.id,
                    "Stored learning path unreadable, computing from assignments: {}",
                    err
                ),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(
                user_id = user_id,
                "Stored learning path lookup failed, computing from assignments: {}",
                err
            ),
        }

        let course_ids = self.assigned_course_ids(user_id).await?;
        if course_ids.is_empty() {
            return Ok(None);
        }

        let rows = self.rows_from_assignments(user_id, &course_ids).await?;
        let statuses = index_statuses(rows.statuses.iter().cloned());
        Ok(Some(overlay_computed_path(assemble_path(rows), &statuses)))
    }

    async fn assigned_course_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let assignments: Vec<CourseAssignmentRow> = fetch_rows(
            self.store.as_ref(),
            &SelectQuery::table("user_course_assignments")
                .select("course_id")
                .eq("user_id", user_id),
        )
        .await?;
        Ok(dedup_ids(assignments.into_iter().map(|a| a.course_id)))
    }

    /// Status rows for `module_ids`; a failed lookup reads as no rows.
    async fn live_statuses(
        &self,
        user_id: &str,
        module_ids: &[String],
    ) -> HashMap<String, UserModuleStatusRow> {
        let query = SelectQuery::table(STATUS_TABLE)
            .select(STATUS_COLUMNS)
            .eq("user_id", user_id);
        match fetch_in_chunks::<UserModuleStatusRow>(
            self.store.as_ref(),
            &query,
            "module_id",
            module_ids,
            self.settings.in_chunk_size,
        )
        .await
        {
            Ok(rows) => index_statuses(rows),
            Err(err) => {
                tracing::warn!(
                    user_id = user_id,
                    "Module status lookup failed, serving stored progress: {}",
                    err
                );
                HashMap::new()
            }
        }
    }

    async fn rows_from_assignments(
        &self,
        user_id: &str,
        course_ids: &[String],
    ) -> Result<PathRows, StoreError> {
        let store = self.store.as_ref();
        let chunk = self.settings.in_chunk_size;

        let courses_query = SelectQuery::table("courses").select("id, title, description");
        let subjects_query =
            SelectQuery::table("subjects").select("id, title, course_id, order_index");
        let (courses, subjects) = tokio::try_join!(
            fetch_in_chunks::<CourseRow>(store, &courses_query, "id", course_ids, chunk),
            fetch_in_chunks::<SubjectRow>(store, &subjects_query, "course_id", course_ids, chunk),
        )?;

        let subject_ids: Vec<String> = subjects.iter().map(|s| s.id.clone()).collect();
        let modules: Vec<ModuleRow> = fetch_in_chunks(
            store,
            &SelectQuery::table("modules").select("id, title, subject_id, order_index"),
            "subject_id",
            &subject_ids,
            chunk,
        )
        .await?;

        let module_ids: Vec<String> = modules.iter().map(|m| m.id.clone()).collect();
        let statuses_query = SelectQuery::table(STATUS_TABLE)
            .select(STATUS_COLUMNS)
            .eq("user_id", user_id);
        let sections_query = SelectQuery::table("sections").select("id, title, module_id");
        let (statuses, sections) = tokio::try_join!(
            fetch_in_chunks::<UserModuleStatusRow>(
                store,
                &statuses_query,
                "module_id",
                &module_ids,
                chunk
            ),
            fetch_in_chunks::<SectionRow>(store, &sections_query, "module_id", &module_ids, chunk),
        )?;

        Ok(PathRows {
            courses,
            subjects,
            modules,
            statuses,
            sections,
        })
    }

    async fn rows_from_module_status(&self, user_id: &str) -> Result<PathRows, StoreError> {
        let store = self.store.as_ref();
        let chunk = self.settings.in_chunk_size;

        let statuses: Vec<UserModuleStatusRow> = fetch_rows(
            store,
            &SelectQuery::table(STATUS_TABLE)
                .select(STATUS_COLUMNS)
                .eq("user_id", user_id),
        )
        .await?;
        let module_ids = dedup_ids(statuses.iter().map(|s| s.module_id.clone()));
        if module_ids.is_empty() {
            return Ok(PathRows::default());
        }

        let modules_query = SelectQuery::table("modules").select("id, title, subject_id, order_index");
        let sections_query = SelectQuery::table("sections").select("id, title, module_id");
        let (modules, sections) = tokio::try_join!(
            fetch_in_chunks::<ModuleRow>(store, &modules_query, "id", &module_ids, chunk),
            fetch_in_chunks::<SectionRow>(store, &sections_query, "module_id", &module_ids, chunk),
        )?;

        let subject_ids = dedup_ids(modules.iter().filter_map(|m| m.subject_id.clone()));
        let subjects: Vec<SubjectRow> = fetch_in_chunks(
            store,
            &SelectQuery::table("subjects").select("id, title, course_id, order_index"),
            "id",
            &subject_ids,
            chunk,
        )
        .await?;

        let course_ids = dedup_ids(subjects.iter().filter_map(|s| s.course_id.clone()));
        let courses: Vec<CourseRow> = fetch_in_chunks(
            store,
            &SelectQuery::table("courses").select("id, title, description"),
            "id",
            &course_ids,
            chunk,
        )
        .await?;

        Ok(PathRows {
            courses,
            subjects,
            modules,
            statuses,
            sections,
        })
    }

    async fn insert_path(
        &self,
        user_id: &str,
        path: &LearningPath,
    ) -> Result<UserLearningPathRow, StoreError> {
        let row = json!({
            "user_id": user_id,
            "path": encode_path(path)?,
            "required": true,
        });
        let inserted = track_store_query(
            PATH_TABLE,
            self.store.insert(PATH_TABLE, row, PATH_COLUMNS),
        )
        .await?;

        serde_json::from_value(inserted).map_err(|err| StoreError::Decode {
            table: PATH_TABLE.to_string(),
            message: err.to_string(),
        })
    }

    async fn update_path(
        &self,
        path_id: &str,
        path: &LearningPath,
    ) -> Result<UserLearningPathRow, StoreError> {
        let patch = json!({
            "path": encode_path(path)?,
            "required": true,
        });
        let filters = [Filter::Eq("id".to_string(), path_id.to_string())];
        let updated = track_store_query(
            PATH_TABLE,
            self.store.update(PATH_TABLE, &filters, patch, PATH_COLUMNS),
        )
        .await?;

        decode_rows::<UserLearningPathRow>(PATH_TABLE, updated)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode {
                table: PATH_TABLE.to_string(),
                message: format!("update of path {} returned no row", path_id),
            })
    }
}

fn encode_path(path: &LearningPath) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(path).map_err(|err| StoreError::Decode {
        table: PATH_TABLE.to_string(),
        message: err.to_string(),
    })
}

fn index_statuses<I>(rows: I) -> HashMap<String, UserModuleStatusRow>
where
    I: IntoIterator<Item = UserModuleStatusRow>,
{
    rows.into_iter()
        .map(|row| (row.module_id.clone(), row))
        .collect()
}

/// Progress rounded to a whole percentage within 0..=100.
fn clamp_progress(progress: Option<f64>) -> Option<f64> {
    progress.map(|value| value.clamp(0.0, 100.0).round())
}

fn overlay_status(module: &mut PathModule, status: Option<&UserModuleStatusRow>) {
    let Some(status) = status else {
        return;
    };
    module.progress = clamp_progress(status.progress);
    if let Some(correctness) = status.correctness_percentage {
        module.correctness_percentage = correctness;
    }
    if module.progress.is_some_and(|progress| progress >= 100.0) {
        module.completed = true;
    }
}

fn overlay_stored_path(
    path: LearningPath,
    statuses: &HashMap<String, UserModuleStatusRow>,
) -> LearningPath {
    let courses = sort_by_order(path.courses)
        .into_iter()
        .map(|mut course| {
            course.subjects = sort_by_order(course.subjects)
                .into_iter()
                .map(|mut subject| {
                    let mut modules = sort_by_order(subject.modules);
                    for module in &mut modules {
                        overlay_status(module, statuses.get(&module.id));
                        if module.status.is_optional() || module.order_index == Some(0.0) {
                            activate(module);
                        }
                    }
                    ensure_first_module_active(&mut modules);
                    subject.modules = modules;
                    subject
                })
                .collect();
            course
        })
        .collect();

    LearningPath { courses }
}

/// Computed trees re-run sequential activation once progress is known.
fn overlay_computed_path(
    mut path: LearningPath,
    statuses: &HashMap<String, UserModuleStatusRow>,
) -> LearningPath {
    for subject in path
        .courses
        .iter_mut()
        .flat_map(|course| course.subjects.iter_mut())
    {
        let mut modules = std::mem::take(&mut subject.modules);
        for module in &mut modules {
            overlay_status(module, statuses.get(&module.id));
        }
        subject.modules = apply_activation(modules);
    }
    path
}

/// Nests the rows into courses -> subjects -> modules -> sections.
///
/// Children whose parent is not among the loaded rows are dropped. Courses
/// and subjects are ordered, modules ordered and annotated with activation.
fn assemble_path(rows: PathRows) -> LearningPath {
    let PathRows {
        courses,
        subjects,
        modules,
        statuses,
        sections,
    } = rows;

    let mut sections_by_module: HashMap<String, Vec<PathSection>> = HashMap::new();
    for section in sections {
        sections_by_module
            .entry(section.module_id.clone())
            .or_default()
            .push(PathSection {
                id: section.id,
                title: section.title,
                module_id: section.module_id,
            });
    }

    let status_by_module = index_statuses(statuses);

    let mut modules_by_subject: HashMap<String, Vec<PathModule>> = HashMap::new();
    for module in modules {
        let Some(subject_id) = module.subject_id else {
            continue;
        };
        let status = status_by_module.get(&module.id);
        let requirement = status.map(|s| s.status).unwrap_or_default();
        let sections = sections_by_module.remove(&module.id).unwrap_or_default();

        modules_by_subject
            .entry(subject_id.clone())
            .or_default()
            .push(PathModule {
                id: module.id,
                title: module.title,
                subject_id,
                order_index: module.order_index,
                status: requirement,
                is_mandatory: requirement.is_mandatory(),
                correctness_percentage: status
                    .and_then(|s| s.correctness_percentage)
                    .unwrap_or(0.0),
                last_updated: status.and_then(|s| s.last_updated.clone()),
                completed: false,
                progress: None,
                activity: None,
                is_active: false,
                active: ActivationState::Inactive,
                sections,
            });
    }

    let mut subjects_by_course: HashMap<String, Vec<PathSubject>> = HashMap::new();
    for subject in subjects {
        let Some(course_id) = subject.course_id else {
            continue;
        };
        let modules = modules_by_subject.remove(&subject.id).unwrap_or_default();
        subjects_by_course
            .entry(course_id.clone())
            .or_default()
            .push(PathSubject {
                id: subject.id,
                title: subject.title,
                course_id,
                order_index: subject.order_index,
                modules: apply_activation(modules),
            });
    }

    let courses = courses
        .into_iter()
        .map(|course| PathCourse {
            subjects: sort_by_order(subjects_by_course.remove(&course.id).unwrap_or_default()),
            id: course.id,
            title: course.title,
            description: course.description.filter(|d| !d.is_empty()),
            order_index: course.order_index,
        })
        .collect();

    LearningPath {
        courses: sort_by_order(courses),
    }
}
