pub mod notifications;
pub mod session;
pub mod trip;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(session::router())
        .merge(trip::router())
        .merge(notifications::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    authenticated: bool,
    active_trip: Option<String>,
    request_in_flight: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let authenticated = state.session.read().await.is_authenticated();
    let active_trip = state.workflow.current().await.map(|snapshot| snapshot.trip.id);

    Json(HealthResponse {
        status: "ok",
        authenticated,
        active_trip,
        request_in_flight: state.workflow.is_in_flight(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
