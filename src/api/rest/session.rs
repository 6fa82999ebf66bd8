use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::credentials::{validate_login_credentials, validate_password_change};
use crate::error::AppError;
use crate::remote::RemoteError;
use crate::session::{SessionContext, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/login", post(login))
        .route("/session/logout", post(logout))
        .route("/session/password", post(change_password))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<User>,
    pub remembered_email: Option<String>,
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let context = state.session_context().await;
    Json(SessionResponse {
        authenticated: context.is_authenticated(),
        user: context.user,
        remembered_email: state.sessions.remembered_email(),
    })
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    validate_login_credentials(&payload.email, &payload.password)
        .into_result()
        .map_err(AppError::Validation)?;

    let email = payload.email.trim();
    let auth = state
        .workflow
        .remote()
        .login(email, payload.password.trim())
        .await
        .map_err(|err| match err {
            RemoteError::Unauthorized => AppError::Unauthorized("invalid email or password".to_string()),
            RemoteError::Status { status, message } if (400..500).contains(&status) => {
                AppError::Unauthorized(message)
            }
            other => AppError::Remote(other),
        })?;

    let context = SessionContext::authenticated(auth.token, auth.user.clone());
    state.set_session(context.clone(), payload.remember_me).await?;
    info!(user_id = %auth.user.id, "driver logged in");

    if let Err(err) = state.workflow.refresh(&context).await {
        warn!(error = %err, "could not load active trip after login");
    }

    Ok(Json(SessionResponse {
        authenticated: true,
        user: Some(auth.user),
        remembered_email: state.sessions.remembered_email(),
    }))
}

async fn logout(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    state.end_session().await;
    info!("driver logged out");

    Json(SessionResponse {
        authenticated: false,
        user: None,
        remembered_email: state.sessions.remembered_email(),
    })
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_password_change(
        &payload.current_password,
        &payload.new_password,
        &payload.confirm_password,
    )
    .into_result()
    .map_err(AppError::Validation)?;

    let context = state.session_context().await;
    let token = context.require_token()?;
    let result = state
        .workflow
        .remote()
        .change_password(token, &payload.current_password, &payload.new_password)
        .await
        .map_err(AppError::from);
    state.guard(result).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
