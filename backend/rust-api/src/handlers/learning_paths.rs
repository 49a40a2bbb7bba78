use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    extractors::LenientJson,
    middlewares::auth::{BearerToken, JwtClaims},
    models::{
        learning_path::{LearningPath, UserLearningPathRow},
        progress::{ModuleCompletionSummary, SectionStatusSummary},
    },
    services::{
        backend_api::refresh_initiated, identifier_resolver::normalize_requested_ids,
        learning_path_service::GenerateOutcome, lecture_progress_service::LectureProgressFilter,
        store::StoreError, AppState,
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModuleStatusRequest {
    #[serde(default)]
    module_ids: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ModuleStatusResponse {
    statuses: HashMap<String, ModuleCompletionSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SectionStatusRequest {
    #[serde(default)]
    section_ids: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionStatusResponse {
    statuses: HashMap<String, SectionStatusSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchedLecturesResponse {
    watched_lecture_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateParams {
    refresh: Option<String>,
}

impl GenerateParams {
    fn refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

pub(crate) async fn module_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    LenientJson(request): LenientJson<ModuleStatusRequest>,
) -> Result<Json<ModuleStatusResponse>, ApiError> {
    let requested = normalize_requested_ids(&request.module_ids);
    let statuses = state
        .module_statuses()
        .load_statuses(&claims.sub, requested)
        .await
        .map_err(|err| ApiError::store("module status", err))?;

    Ok(Json(ModuleStatusResponse { statuses }))
}

pub(crate) async fn section_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    LenientJson(request): LenientJson<SectionStatusRequest>,
) -> Result<Json<SectionStatusResponse>, ApiError> {
    let section_ids = normalize_requested_ids(&request.section_ids);
    let statuses = state
        .section_statuses()
        .load_statuses(&claims.sub, section_ids)
        .await
        .map_err(|err| ApiError::store("section status", err))?;

    Ok(Json(SectionStatusResponse { statuses }))
}

pub(crate) async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(params): Query<GenerateParams>,
) -> Result<(StatusCode, Json<UserLearningPathRow>), ApiError> {
    let (row, outcome) = state
        .learning_paths()
        .generate(&claims.sub, params.refresh())
        .await
        .map_err(|err| ApiError::store("learning path generation", err))?;

    let status = match outcome {
        GenerateOutcome::Created => StatusCode::CREATED,
        GenerateOutcome::Existing | GenerateOutcome::Refreshed => StatusCode::OK,
    };
    Ok((status, Json(row)))
}

pub(crate) async fn my_learning_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<LearningPath>, ApiError> {
    state
        .learning_paths()
        .load_for_learner(&claims.sub)
        .await
        .map_err(|err| ApiError::store("learning path lookup", err))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No courses assigned to the user"))
}

pub(crate) async fn watched_lectures(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(filter): Query<LectureProgressFilter>,
) -> Result<Json<WatchedLecturesResponse>, ApiError> {
    let watched_lecture_ids = state
        .lecture_progress()
        .watched_lecture_ids(&claims.sub, &filter)
        .await
        .map_err(|err| {
            tracing::error!(user_id = %claims.sub, "Failed to fetch lecture progress: {}", err);
            ApiError::Internal("Failed to fetch lecture progress".to_string())
        })?;

    Ok(Json(WatchedLecturesResponse {
        watched_lecture_ids,
    }))
}

/// Relays a refresh request to the backend API; never fails on its account.
pub(crate) async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Json<Value> {
    tracing::info!(user_id = %claims.sub, "Refreshing learning path via backend");

    match state.backend.refresh_learning_path(&token).await {
        Ok(body) => Json(body),
        Err(err) => {
            tracing::warn!(user_id = %claims.sub, "Backend refresh unavailable: {:#}", err);
            Json(refresh_initiated())
        }
    }
}

#[derive(Debug)]
pub(crate) enum ApiError {
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn store(operation: &str, err: StoreError) -> Self {
        tracing::error!(operation = operation, "Store failure: {}", err);
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
