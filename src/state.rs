use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::engine::workflow::TripWorkflow;
use crate::error::AppError;
use crate::models::notification::DEFAULT_NOTIFICATION_CAPACITY;
use crate::observability::metrics::Metrics;
use crate::remote::{RemoteError, TripService};
use crate::session::{MemoryStore, SessionContext, SessionManager};

pub struct AppState {
    pub workflow: TripWorkflow,
    pub sessions: SessionManager<MemoryStore>,
    pub session: RwLock<SessionContext>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        remote: Arc<dyn TripService>,
        store: MemoryStore,
        notification_capacity: usize,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let sessions = SessionManager::new(store);
        let session = sessions.load();

        Self {
            workflow: TripWorkflow::new(
                remote,
                metrics.clone(),
                notification_capacity,
                event_buffer_size,
            ),
            sessions,
            session: RwLock::new(session),
            metrics,
        }
    }

    pub fn with_defaults(remote: Arc<dyn TripService>) -> Self {
        Self::new(remote, MemoryStore::new(), DEFAULT_NOTIFICATION_CAPACITY, 1024)
    }

    /// Snapshot of the session to hand to a workflow call.
    pub async fn session_context(&self) -> SessionContext {
        self.session.read().await.clone()
    }

    pub async fn set_session(&self, context: SessionContext, remember_me: bool) -> Result<(), AppError> {
        self.sessions.persist(&context, remember_me)?;
        *self.session.write().await = context;
        Ok(())
    }

    pub async fn end_session(&self) {
        self.sessions.clear();
        *self.session.write().await = SessionContext::default();
        self.workflow.clear().await;
    }

    /// An expired token ends the local session before the error reaches the caller.
    pub async fn guard<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(AppError::Remote(RemoteError::Unauthorized)) = &result {
            warn!("trip service rejected the session token; clearing session");
            self.end_session().await;
        }
        result
    }
}
