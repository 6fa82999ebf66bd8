use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::gating::{validate_for_completion, validate_for_upload};
use crate::engine::status::propose_transition;
use crate::models::document::{Document, DocumentStage};
use crate::models::trip::{Contact, Location, LocationCoordinates, Timeline, Trip, TripAction, TripStatus};
use crate::remote::{
    AuthResponse, CompletionPayload, Page, RemoteDriver, RemoteError, RemoteTrip, TripService,
    UploadResponse,
};
use crate::session::User;

pub const DEMO_EMAIL: &str = "driver@fleet.test";
pub const DEMO_PASSWORD: &str = "driver123";

/// A freshly assigned Mumbai to Pune trip.
pub fn sample_trip(id: &str, assigned_at: DateTime<Utc>) -> Trip {
    Trip {
        id: id.to_string(),
        trip_number: format!("TRP-{id}"),
        order_number: "ORD-2041".to_string(),
        vehicle_number: "MH-04-AB-1234".to_string(),
        assigned_weight: 18.0,
        delivered_weight: None,
        status: TripStatus::Assigned,
        loading_location: Location {
            address: "Bhiwandi Logistics Park, Gate 3".to_string(),
            coordinates: LocationCoordinates {
                latitude: 19.2813,
                longitude: 73.0483,
                accuracy: 10.0,
                timestamp: assigned_at,
            },
            contact_person: Contact {
                name: "Ravi Kulkarni".to_string(),
                phone: "+91-90000-00001".to_string(),
            },
        },
        unloading_location: Location {
            address: "Chakan Distribution Centre, Pune".to_string(),
            coordinates: LocationCoordinates {
                latitude: 18.7606,
                longitude: 73.8636,
                accuracy: 10.0,
                timestamp: assigned_at,
            },
            contact_person: Contact {
                name: "Meera Joshi".to_string(),
                phone: "+91-90000-00002".to_string(),
            },
        },
        timeline: Timeline::assigned_at(assigned_at),
        documents: BTreeMap::new(),
        remarks: BTreeMap::new(),
        tracking_data: Vec::new(),
    }
}

struct Account {
    password: String,
    user: User,
}

/// Trip service kept entirely in process. Backs the offline mode and the tests.
pub struct InMemoryTripService {
    accounts: DashMap<String, Account>,
    tokens: DashMap<String, String>,
    trips: DashMap<String, Trip>,
    active: Mutex<Option<String>>,
    failures: Mutex<VecDeque<RemoteError>>,
    latency: Duration,
}

impl Default for InMemoryTripService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTripService {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            tokens: DashMap::new(),
            trips: DashMap::new(),
            active: Mutex::new(None),
            failures: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
        }
    }

    /// Demo driver with one assigned trip.
    pub fn demo() -> Self {
        let service = Self::new();
        service.add_driver(
            DEMO_EMAIL,
            DEMO_PASSWORD,
            User {
                id: "driver-1".to_string(),
                name: "Demo Driver".to_string(),
                email: DEMO_EMAIL.to_string(),
                phone: Some("+91-90000-00099".to_string()),
            },
        );
        service.assign_trip(sample_trip("trip-1", Utc::now()));
        service
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_driver(&self, email: &str, password: &str, user: User) {
        self.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
    }

    /// Issues a token without going through login.
    pub fn issue_token(&self, email: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), email.to_string());
        token
    }

    pub fn assign_trip(&self, trip: Trip) {
        let id = trip.id.clone();
        self.trips.insert(id.clone(), trip);
        if let Ok(mut active) = self.active.lock() {
            *active = Some(id);
        }
    }

    pub fn trip(&self, id: &str) -> Option<Trip> {
        self.trips.get(id).map(|entry| entry.value().clone())
    }

    /// The next call fails with `err`, regardless of its arguments.
    pub fn fail_next(&self, err: RemoteError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(err);
        }
    }

    async fn enter(&self, token: Option<&str>) -> Result<Option<String>, RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let injected = self.failures.lock().ok().and_then(|mut failures| failures.pop_front());
        if let Some(err) = injected {
            return Err(err);
        }

        match token {
            Some(token) => self
                .tokens
                .get(token)
                .map(|entry| Some(entry.value().clone()))
                .ok_or(RemoteError::Unauthorized),
            None => Ok(None),
        }
    }

    fn driver_for(&self, email: &str) -> RemoteDriver {
        self.accounts
            .get(email)
            .map(|account| RemoteDriver {
                id: account.user.id.clone(),
                name: account.user.name.clone(),
            })
            .unwrap_or_else(|| RemoteDriver {
                id: "unknown".to_string(),
                name: email.to_string(),
            })
    }

    fn active_id(&self) -> Option<String> {
        self.active.lock().ok().and_then(|active| active.clone())
    }

    fn conflict(message: impl Into<String>) -> RemoteError {
        RemoteError::Status {
            status: 409,
            message: message.into(),
        }
    }
}

#[async_trait]
impl TripService for InMemoryTripService {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, RemoteError> {
        self.enter(None).await?;

        let user = match self.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(RemoteError::Status {
                    status: 400,
                    message: "invalid email or password".to_string(),
                })
            }
        };

        Ok(AuthResponse {
            token: self.issue_token(email),
            user,
        })
    }

    async fn change_password(
        &self,
        token: &str,
        current: &str,
        new: &str,
    ) -> Result<(), RemoteError> {
        let email = self.enter(Some(token)).await?.unwrap_or_default();
        let mut account = self
            .accounts
            .get_mut(&email)
            .ok_or(RemoteError::Unauthorized)?;

        if account.password != current {
            return Err(RemoteError::Status {
                status: 400,
                message: "current password is incorrect".to_string(),
            });
        }

        account.password = new.to_string();
        Ok(())
    }

    async fn fetch_active_trip(&self, token: &str) -> Result<Option<RemoteTrip>, RemoteError> {
        let email = self.enter(Some(token)).await?.unwrap_or_default();

        Ok(self
            .active_id()
            .and_then(|id| self.trip(&id))
            .map(|trip| RemoteTrip::from_trip(&trip, self.driver_for(&email))))
    }

    async fn transition(
        &self,
        token: &str,
        trip_id: &str,
        action: TripAction,
        completion: Option<&CompletionPayload>,
    ) -> Result<RemoteTrip, RemoteError> {
        let email = self.enter(Some(token)).await?.unwrap_or_default();
        let mut trip = self.trip(trip_id).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("trip {trip_id} not found"),
        })?;

        if action == TripAction::Complete {
            let check = validate_for_completion(&trip.all_documents());
            if !check.is_valid {
                return Err(Self::conflict(check.errors.join("; ")));
            }
            let payload = completion
                .ok_or_else(|| Self::conflict("completion requires delivered weight and position"))?;
            trip.delivered_weight = Some(payload.delivered_weight);
        }

        let transition = propose_transition(&trip, action.target_status(), Utc::now())
            .map_err(|err| Self::conflict(err.to_string()))?;
        self.trips.insert(trip_id.to_string(), transition.trip.clone());

        Ok(RemoteTrip::from_trip(&transition.trip, self.driver_for(&email)))
    }

    async fn upload_documents(
        &self,
        token: &str,
        trip_id: &str,
        stage: DocumentStage,
        documents: &[Document],
        remarks: Option<&str>,
    ) -> Result<UploadResponse, RemoteError> {
        self.enter(Some(token)).await?;
        let mut trip = self.trip(trip_id).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("trip {trip_id} not found"),
        })?;

        if let Err(err) = validate_for_upload(&trip, stage) {
            return Ok(UploadResponse {
                success: false,
                message: err.to_string(),
            });
        }

        let stored = trip.documents.entry(stage).or_default();
        stored.extend(documents.iter().cloned().map(|mut doc| {
            doc.uploaded = true;
            doc
        }));
        if let Some(remarks) = remarks {
            trip.remarks.insert(stage, remarks.to_string());
        }
        self.trips.insert(trip_id.to_string(), trip);

        Ok(UploadResponse {
            success: true,
            message: format!("{} {stage} document(s) uploaded", documents.len()),
        })
    }

    async fn trip_history(
        &self,
        token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<RemoteTrip>, RemoteError> {
        let email = self.enter(Some(token)).await?.unwrap_or_default();

        let mut completed: Vec<Trip> = self
            .trips
            .iter()
            .filter(|entry| entry.value().status == TripStatus::Completed)
            .map(|entry| entry.value().clone())
            .collect();
        completed.sort_by(|a, b| b.timeline.completed.cmp(&a.timeline.completed));

        let page = page.max(1);
        let limit = limit.max(1);
        let skip = (page as usize - 1) * limit as usize;
        let total = completed.len() as u64;
        let driver = self.driver_for(&email);

        Ok(Page {
            items: completed
                .iter()
                .skip(skip)
                .take(limit as usize)
                .map(|trip| RemoteTrip::from_trip(trip, driver.clone()))
                .collect(),
            page,
            limit,
            total,
        })
    }
}
