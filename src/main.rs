use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use trip_workflow::api;
use trip_workflow::config::Config;
use trip_workflow::error::AppError;
use trip_workflow::remote::http::HttpTripService;
use trip_workflow::remote::memory::{InMemoryTripService, DEMO_EMAIL};
use trip_workflow::remote::TripService;
use trip_workflow::session::MemoryStore;
use trip_workflow::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let remote: Arc<dyn TripService> = match &config.trip_service_url {
        Some(url) => {
            tracing::info!(
                trip_service = %url,
                capture_dir = %config.capture_dir.display(),
                "using remote trip service"
            );
            Arc::new(HttpTripService::new(
                url,
                Duration::from_secs(config.request_timeout_secs),
                config.capture_dir.clone(),
            )?)
        }
        None => {
            tracing::warn!(demo_login = DEMO_EMAIL, "TRIP_SERVICE_URL not set; using in-memory demo trip service");
            Arc::new(InMemoryTripService::demo())
        }
    };

    let shared_state = Arc::new(AppState::new(
        remote,
        MemoryStore::new(),
        config.notification_capacity,
        config.event_buffer_size,
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
