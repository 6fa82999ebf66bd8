use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::gating::{
    active_status_for, build_documents, validate_candidates, validate_for_completion,
    validate_for_upload,
};
use crate::engine::status::{propose_transition, validate_trip, TrackingChange};
use crate::engine::tracking::{is_tracking_active, last_known_position, record_sample};
use crate::engine::view_model::{derive_view_model, TripViewModel};
use crate::error::{AppError, LifecycleError};
use crate::models::document::{DocumentStage, FileCandidate};
use crate::models::notification::{Notification, NotificationInbox, NotificationType};
use crate::models::tracking::{LocationPoint, LocationSample};
use crate::models::trip::{Trip, TripAction, TripStatus};
use crate::observability::metrics::{outcome, Metrics};
use crate::remote::{CompletionPayload, Page, TripService};
use crate::session::SessionContext;

/// Server-confirmed trip plus the local optimistic view layered on top.
#[derive(Debug, Clone)]
struct TripSession {
    confirmed: Trip,
    current: Trip,
    revision: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TripSnapshot {
    pub trip: Trip,
    pub view_model: TripViewModel,
}

impl TripSnapshot {
    fn of(trip: &Trip) -> Self {
        Self {
            trip: trip.clone(),
            view_model: derive_view_model(trip),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripEventKind {
    Refreshed,
    Optimistic,
    Confirmed,
    RolledBack,
    TrackingUpdated,
    RemarksUpdated,
    Cleared,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripEvent {
    pub kind: TripEventKind,
    pub trip_id: Option<String>,
    pub view_model: Option<TripViewModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionInput {
    pub delivered_weight: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub message: String,
    #[serde(flatten)]
    pub snapshot: TripSnapshot,
}

/// Clears the in-flight flag when the guarded request resolves, however it ends.
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    metrics: &'a Metrics,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.metrics.requests_in_flight.dec();
    }
}

/// Fails with `DocumentsIncomplete` unless both stages carry a document.
pub fn check_completion(trip: &Trip) -> Result<(), LifecycleError> {
    let check = validate_for_completion(&trip.all_documents());
    if check.is_valid {
        Ok(())
    } else {
        Err(LifecycleError::DocumentsIncomplete(check.errors))
    }
}

fn completion_payload(trip: &Trip, input: &CompletionInput) -> Result<CompletionPayload, AppError> {
    let delivered_weight = input
        .delivered_weight
        .filter(|weight| weight.is_finite() && *weight > 0.0)
        .ok_or_else(|| AppError::Validation("Delivered weight is required".to_string()))?;

    let (latitude, longitude) = match (input.latitude, input.longitude) {
        (Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => last_known_position(trip)
            .map(|point| (point.latitude, point.longitude))
            .unwrap_or((
                trip.unloading_location.coordinates.latitude,
                trip.unloading_location.coordinates.longitude,
            )),
    };

    Ok(CompletionPayload {
        delivered_weight,
        latitude,
        longitude,
    })
}

pub struct TripWorkflow {
    remote: Arc<dyn TripService>,
    session: RwLock<Option<TripSession>>,
    notifications: RwLock<NotificationInbox>,
    in_flight: AtomicBool,
    revisions: AtomicU64,
    events_tx: broadcast::Sender<TripEvent>,
    metrics: Metrics,
}

impl TripWorkflow {
    pub fn new(
        remote: Arc<dyn TripService>,
        metrics: Metrics,
        notification_capacity: usize,
        event_buffer_size: usize,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            remote,
            session: RwLock::new(None),
            notifications: RwLock::new(NotificationInbox::new(notification_capacity)),
            in_flight: AtomicBool::new(false),
            revisions: AtomicU64::new(0),
            events_tx,
            metrics,
        }
    }

    pub fn remote(&self) -> &Arc<dyn TripService> {
        &self.remote
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn current(&self) -> Option<TripSnapshot> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| TripSnapshot::of(&session.current))
    }

    /// Marks a mutating request as pending, or fails if one already is.
    pub fn begin_request(&self) -> Result<InFlightGuard<'_>, AppError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::RequestInFlight)?;
        self.metrics.requests_in_flight.inc();

        Ok(InFlightGuard {
            flag: &self.in_flight,
            metrics: &self.metrics,
        })
    }

    /// Replaces the session with the remote's active trip.
    pub async fn refresh(&self, ctx: &SessionContext) -> Result<Option<TripSnapshot>, AppError> {
        let token = ctx.require_token()?;

        let started = Instant::now();
        let result = self.remote.fetch_active_trip(token).await;
        self.metrics
            .observe_remote("fetch_active_trip", result.is_ok(), started.elapsed().as_secs_f64());

        let Some(remote_trip) = result? else {
            self.clear().await;
            info!("no active trip");
            return Ok(None);
        };

        let mut trip = remote_trip.normalize()?;
        let mut guard = self.session.write().await;
        let previous = guard.as_ref().map(|session| session.current.clone());

        if let Some(previous) = previous.as_ref().filter(|prev| prev.id == trip.id) {
            if is_tracking_active_or_done(trip.status) && trip.tracking_data.is_empty() {
                trip.tracking_data = previous.tracking_data.clone();
            }
            for (stage, text) in &previous.remarks {
                trip.remarks.entry(*stage).or_insert_with(|| text.clone());
            }
        }
        validate_trip(&trip)?;

        let revision = self.revisions.fetch_add(1, Ordering::AcqRel) + 1;
        *guard = Some(TripSession {
            confirmed: trip.clone(),
            current: trip.clone(),
            revision,
        });
        drop(guard);

        let is_new = previous.map_or(true, |prev| prev.id != trip.id);
        if is_new {
            info!(trip_id = %trip.id, status = %trip.status, "active trip assigned");
            self.notify(Notification::new(
                NotificationType::TripAssignment,
                "New trip assigned",
                format!(
                    "Trip {}: {} to {}",
                    trip.trip_number, trip.loading_location.address, trip.unloading_location.address
                ),
            ))
            .await;
        }

        let snapshot = TripSnapshot::of(&trip);
        self.emit(TripEventKind::Refreshed, Some(&snapshot));
        Ok(Some(snapshot))
    }

    pub async fn transition(
        &self,
        ctx: &SessionContext,
        action: TripAction,
        input: &CompletionInput,
    ) -> Result<TripSnapshot, AppError> {
        let token = ctx.require_token()?;
        let _guard = self.begin_request()?;

        let result = self.run_transition(token, action, input).await;
        self.metrics
            .trip_transitions_total
            .with_label_values(&[action.as_str(), outcome(result.is_ok())])
            .inc();
        result
    }

    async fn run_transition(
        &self,
        token: &str,
        action: TripAction,
        input: &CompletionInput,
    ) -> Result<TripSnapshot, AppError> {
        let (base, revision) = self.current_with_revision().await?;

        let completion = if action == TripAction::Complete {
            check_completion(&base)?;
            Some(completion_payload(&base, input)?)
        } else {
            None
        };

        let transition = propose_transition(&base, action.target_status(), Utc::now())?;
        match transition.tracking {
            TrackingChange::Started => info!(trip_id = %base.id, "gps tracking started"),
            TrackingChange::Stopped => info!(
                trip_id = %base.id,
                points = transition.trip.tracking_data.len(),
                "gps tracking stopped"
            ),
            TrackingChange::Unchanged => {}
        }
        self.publish_optimistic(revision, transition.trip).await;

        let started = Instant::now();
        let result = self
            .remote
            .transition(token, &base.id, action, completion.as_ref())
            .await
            .and_then(|remote| remote.normalize());
        self.metrics
            .observe_remote("transition", result.is_ok(), started.elapsed().as_secs_f64());

        let server_trip = match result {
            Ok(trip) => trip,
            Err(err) => {
                warn!(trip_id = %base.id, action = %action, error = %err, "transition failed; rolling back");
                self.rollback(revision).await;
                return Err(err.into());
            }
        };

        let snapshot = self.confirm(revision, &base.id, server_trip).await?;
        info!(trip_id = %base.id, status = %snapshot.trip.status, "trip status confirmed");

        match snapshot.trip.status {
            TripStatus::Arrived => {
                self.notify(Notification::new(
                    NotificationType::Arrival,
                    "Arrived at unloading point",
                    format!(
                        "Trip {} reached {}. Upload unloading documents to complete.",
                        snapshot.trip.trip_number, snapshot.trip.unloading_location.address
                    ),
                ))
                .await
            }
            TripStatus::Completed => {
                self.notify(Notification::new(
                    NotificationType::Completion,
                    "Trip completed",
                    format!("Trip {} delivered.", snapshot.trip.trip_number),
                ))
                .await
            }
            TripStatus::Assigned | TripStatus::InProgress | TripStatus::Loaded => {}
        }

        Ok(snapshot)
    }

    pub async fn upload_documents(
        &self,
        ctx: &SessionContext,
        stage: DocumentStage,
        files: &[FileCandidate],
        remarks: Option<String>,
    ) -> Result<UploadOutcome, AppError> {
        let token = ctx.require_token()?;
        let _guard = self.begin_request()?;

        let result = self.run_upload(token, stage, files, remarks).await;
        self.metrics
            .document_uploads_total
            .with_label_values(&[stage.as_str(), outcome(result.is_ok())])
            .inc();
        result
    }

    async fn run_upload(
        &self,
        token: &str,
        stage: DocumentStage,
        files: &[FileCandidate],
        remarks: Option<String>,
    ) -> Result<UploadOutcome, AppError> {
        let (base, revision) = self.current_with_revision().await?;

        validate_for_upload(&base, stage)?;
        validate_candidates(files)?;
        self.remote.inspect_files(files).await?;

        let documents = build_documents(&base.id, stage, files, Utc::now());
        let mut optimistic = base.clone();
        optimistic
            .documents
            .entry(stage)
            .or_default()
            .extend(documents.iter().cloned());
        if let Some(text) = remarks.as_ref().filter(|text| !text.trim().is_empty()) {
            optimistic.remarks.insert(stage, text.clone());
        }
        self.publish_optimistic(revision, optimistic).await;

        let started = Instant::now();
        let result = self
            .remote
            .upload_documents(token, &base.id, stage, &documents, remarks.as_deref())
            .await;
        self.metrics
            .observe_remote("upload_documents", result.is_ok(), started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) if response.success => response,
            Ok(response) => {
                warn!(trip_id = %base.id, stage = %stage, message = %response.message, "upload rejected");
                self.rollback(revision).await;
                return Err(AppError::Conflict(format!("upload rejected: {}", response.message)));
            }
            Err(err) => {
                warn!(trip_id = %base.id, stage = %stage, error = %err, "upload failed; rolling back");
                self.rollback(revision).await;
                return Err(err.into());
            }
        };

        let uploaded_ids: Vec<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .filter(|session| session.revision == revision)
            .ok_or_else(stale_response)?;

        if let Some(stored) = session.current.documents.get_mut(&stage) {
            for doc in stored.iter_mut().filter(|doc| uploaded_ids.contains(&doc.id.as_str())) {
                doc.uploaded = true;
            }
        }
        session.confirmed = session.current.clone();
        let snapshot = TripSnapshot::of(&session.current);
        drop(guard);

        info!(trip_id = %base.id, stage = %stage, count = documents.len(), "documents uploaded");
        self.emit(TripEventKind::Confirmed, Some(&snapshot));

        Ok(UploadOutcome {
            message: response.message,
            snapshot,
        })
    }

    /// Remarks are advisory: editable while their stage is active, never gating.
    pub async fn update_remarks(&self, stage: DocumentStage, text: &str) -> Result<TripSnapshot, AppError> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(LifecycleError::NoActiveTrip)?;

        let status = session.current.status;
        if status != active_status_for(stage) {
            return Err(LifecycleError::RemarksLocked { stage, status }.into());
        }

        for trip in [&mut session.current, &mut session.confirmed] {
            if text.trim().is_empty() {
                trip.remarks.remove(&stage);
            } else {
                trip.remarks.insert(stage, text.to_string());
            }
        }

        let snapshot = TripSnapshot::of(&session.current);
        drop(guard);
        self.emit(TripEventKind::RemarksUpdated, Some(&snapshot));
        Ok(snapshot)
    }

    /// Records a GPS fix if tracking is active. `Ok(None)` means it was dropped.
    pub async fn record_location(&self, sample: &LocationSample) -> Result<Option<LocationPoint>, AppError> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(LifecycleError::NoActiveTrip)?;

        let Some(next) = record_sample(&session.current, sample) else {
            return Ok(None);
        };

        // Points recorded under an unconfirmed start are discarded with it on rollback.
        if is_tracking_active(session.confirmed.status) {
            session.confirmed.tracking_data = next.tracking_data.clone();
        }
        session.current = next;

        let point = session.current.tracking_data.last().cloned();
        let snapshot = TripSnapshot::of(&session.current);
        drop(guard);

        self.metrics.tracking_points_total.inc();
        self.emit(TripEventKind::TrackingUpdated, Some(&snapshot));
        Ok(point)
    }

    pub async fn history(&self, ctx: &SessionContext, page: u32, limit: u32) -> Result<Page<Trip>, AppError> {
        let token = ctx.require_token()?;

        let started = Instant::now();
        let result = self.remote.trip_history(token, page, limit).await;
        self.metrics
            .observe_remote("trip_history", result.is_ok(), started.elapsed().as_secs_f64());

        let mut page = result?.map_items(|remote| remote.normalize())?;
        page.items.retain(|trip| trip.status == TripStatus::Completed);
        Ok(page)
    }

    /// Drops the active trip, e.g. on logout.
    pub async fn clear(&self) {
        *self.session.write().await = None;
        self.revisions.fetch_add(1, Ordering::AcqRel);
        self.emit(TripEventKind::Cleared, None);
    }

    pub async fn notifications(&self) -> (Vec<Notification>, usize) {
        let inbox = self.notifications.read().await;
        (inbox.list(), inbox.unread_count())
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> bool {
        let mut inbox = self.notifications.write().await;
        let found = inbox.mark_read(id);
        self.metrics.notifications_unread.set(inbox.unread_count() as i64);
        found
    }

    pub async fn mark_all_notifications_read(&self) {
        let mut inbox = self.notifications.write().await;
        inbox.mark_all_read();
        self.metrics.notifications_unread.set(0);
    }

    pub async fn clear_notifications(&self) {
        self.notifications.write().await.clear();
        self.metrics.notifications_unread.set(0);
    }

    async fn notify(&self, notification: Notification) {
        let mut inbox = self.notifications.write().await;
        inbox.push(notification);
        self.metrics.notifications_unread.set(inbox.unread_count() as i64);
    }

    async fn current_with_revision(&self) -> Result<(Trip, u64), AppError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(LifecycleError::NoActiveTrip)?;
        Ok((session.current.clone(), session.revision))
    }

    async fn publish_optimistic(&self, revision: u64, trip: Trip) {
        let snapshot = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                Some(session) if session.revision == revision => {
                    session.current = trip;
                    TripSnapshot::of(&session.current)
                }
                _ => return,
            }
        };
        self.emit(TripEventKind::Optimistic, Some(&snapshot));
    }

    async fn rollback(&self, revision: u64) {
        let snapshot = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                Some(session) if session.revision == revision => {
                    session.current = session.confirmed.clone();
                    TripSnapshot::of(&session.current)
                }
                _ => return,
            }
        };
        self.emit(TripEventKind::RolledBack, Some(&snapshot));
    }

    async fn confirm(&self, revision: u64, trip_id: &str, mut server: Trip) -> Result<TripSnapshot, AppError> {
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .filter(|session| session.revision == revision && session.current.id == trip_id)
            .ok_or_else(|| {
                warn!(trip_id, "discarding response for a trip that changed meanwhile");
                stale_response()
            })?;

        if server.tracking_data.is_empty() && is_tracking_active_or_done(server.status) {
            server.tracking_data = session.current.tracking_data.clone();
        }
        for (stage, text) in &session.current.remarks {
            server.remarks.entry(*stage).or_insert_with(|| text.clone());
        }

        let rejected = if server.id != trip_id {
            Some(AppError::Conflict(format!(
                "trip service answered for trip {} instead of {trip_id}",
                server.id
            )))
        } else {
            validate_trip(&server).err().map(AppError::from)
        };
        if let Some(err) = rejected {
            warn!(trip_id, error = %err, "rejecting trip service response; rolling back");
            session.current = session.confirmed.clone();
            let snapshot = TripSnapshot::of(&session.current);
            drop(guard);
            self.emit(TripEventKind::RolledBack, Some(&snapshot));
            return Err(err);
        }

        session.confirmed = server.clone();
        session.current = server;
        let snapshot = TripSnapshot::of(&session.current);
        drop(guard);

        self.emit(TripEventKind::Confirmed, Some(&snapshot));
        Ok(snapshot)
    }

    fn emit(&self, kind: TripEventKind, snapshot: Option<&TripSnapshot>) {
        let _ = self.events_tx.send(TripEvent {
            kind,
            trip_id: snapshot.map(|s| s.trip.id.clone()),
            view_model: snapshot.map(|s| s.view_model.clone()),
        });
    }
}

fn is_tracking_active_or_done(status: TripStatus) -> bool {
    is_tracking_active(status) || status == TripStatus::Completed
}

fn stale_response() -> AppError {
    AppError::Conflict("trip changed while the request was in flight".to_string())
}
