use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::workflow::{CompletionInput, TripSnapshot, UploadOutcome};
use crate::error::{AppError, LifecycleError};
use crate::models::document::{DocumentStage, FileCandidate};
use crate::models::tracking::{LocationPoint, LocationSample};
use crate::models::trip::{Trip, TripAction};
use crate::remote::Page;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trip", get(get_trip))
        .route("/trip/refresh", post(refresh_trip))
        .route("/trip/actions/:action", post(apply_action))
        .route("/trip/documents", post(upload_documents))
        .route("/trip/remarks/:stage", put(update_remarks))
        .route("/trip/tracking", post(record_location))
        .route("/trips/history", get(history))
}

#[derive(Deserialize)]
pub struct UploadRequest {
    pub stage: DocumentStage,
    #[serde(default)]
    pub files: Vec<FileCandidate>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct RemarksRequest {
    pub remarks: String,
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub recorded: bool,
    pub point: Option<LocationPoint>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn get_trip(State(state): State<Arc<AppState>>) -> Result<Json<TripSnapshot>, AppError> {
    state
        .workflow
        .current()
        .await
        .map(Json)
        .ok_or(AppError::Lifecycle(LifecycleError::NoActiveTrip))
}

async fn refresh_trip(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<TripSnapshot>>, AppError> {
    let context = state.session_context().await;
    let result = state.workflow.refresh(&context).await;
    state.guard(result).await.map(Json)
}

async fn apply_action(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    body: Bytes,
) -> Result<Json<TripSnapshot>, AppError> {
    let action: TripAction = action.parse().map_err(AppError::BadRequest)?;
    let input = completion_input(&body)?;

    let context = state.session_context().await;
    let result = state.workflow.transition(&context, action, &input).await;
    state.guard(result).await.map(Json)
}

/// An empty body means no completion details; anything else must be valid JSON.
fn completion_input(body: &[u8]) -> Result<CompletionInput, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CompletionInput::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("invalid action body: {err}")))
}

async fn upload_documents(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadOutcome>, AppError> {
    let context = state.session_context().await;
    let result = state
        .workflow
        .upload_documents(&context, payload.stage, &payload.files, payload.remarks)
        .await;
    state.guard(result).await.map(Json)
}

async fn update_remarks(
    State(state): State<Arc<AppState>>,
    Path(stage): Path<String>,
    Json(payload): Json<RemarksRequest>,
) -> Result<Json<TripSnapshot>, AppError> {
    let stage: DocumentStage = stage.parse().map_err(AppError::BadRequest)?;
    let snapshot = state.workflow.update_remarks(stage, &payload.remarks).await?;
    Ok(Json(snapshot))
}

async fn record_location(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<LocationSample>,
) -> Result<Json<TrackingResponse>, AppError> {
    let point = state.workflow.record_location(&sample).await?;
    Ok(Json(TrackingResponse {
        recorded: point.is_some(),
        point,
    }))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<Trip>>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let context = state.session_context().await;
    let result = state.workflow.history(&context, page, limit).await;
    state.guard(result).await.map(Json)
}
