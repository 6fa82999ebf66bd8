use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications).delete(clear_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

#[derive(Serialize)]
pub struct NotificationList {
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

async fn list_notifications(State(state): State<Arc<AppState>>) -> Json<NotificationList> {
    let (notifications, unread) = state.workflow.notifications().await;
    Json(NotificationList {
        unread,
        notifications,
    })
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.workflow.mark_notification_read(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("notification {id} not found")))
    }
}

async fn mark_all_read(State(state): State<Arc<AppState>>) -> StatusCode {
    state.workflow.mark_all_notifications_read().await;
    StatusCode::NO_CONTENT
}

async fn clear_notifications(State(state): State<Arc<AppState>>) -> StatusCode {
    state.workflow.clear_notifications().await;
    StatusCode::NO_CONTENT
}
