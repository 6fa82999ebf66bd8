//! Seam to the remote trip service.
//!
//! The service speaks camelCase JSON with the trip split across nested
//! `order`, `vehicle` and `driver` objects. [`RemoteTrip::normalize`] flattens
//! that shape into the engine's [`Trip`].

pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::LifecycleError;
use crate::models::document::{Document, DocumentStage, DocumentType, FileCandidate};
use crate::models::trip::{Contact, Location, LocationCoordinates, Timeline, Trip, TripAction};
use crate::session::User;

const DEFAULT_FIX_ACCURACY_M: f64 = 10.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("session expired")]
    Unauthorized,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("cannot read local file: {0}")]
    LocalFile(String),
}

#[async_trait]
pub trait TripService: Send + Sync + 'static {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, RemoteError>;

    async fn change_password(
        &self,
        token: &str,
        current: &str,
        new: &str,
    ) -> Result<(), RemoteError>;

    /// `Ok(None)` when the driver has no active trip.
    async fn fetch_active_trip(&self, token: &str) -> Result<Option<RemoteTrip>, RemoteError>;

    async fn transition(
        &self,
        token: &str,
        trip_id: &str,
        action: TripAction,
        completion: Option<&CompletionPayload>,
    ) -> Result<RemoteTrip, RemoteError>;

    /// Checks the captured files on disk before anything is uploaded.
    /// Services that never read local files accept every candidate.
    async fn inspect_files(&self, _files: &[FileCandidate]) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn upload_documents(
        &self,
        token: &str,
        trip_id: &str,
        stage: DocumentStage,
        documents: &[Document],
        remarks: Option<&str>,
    ) -> Result<UploadResponse, RemoteError>;

    /// Completed trips only, newest first.
    async fn trip_history(
        &self,
        token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<RemoteTrip>, RemoteError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub delivered_weight: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.limit) < self.total
    }

    pub fn map_items<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            page: self.page,
            limit: self.limit,
            total: self.total,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLocation {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub contact_name: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrder {
    pub order_number: String,
    pub assigned_weight: f64,
    #[serde(default)]
    pub delivered_weight: Option<f64>,
    pub loading_location: RemoteLocation,
    pub unloading_location: RemoteLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVehicle {
    pub vehicle_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDriver {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub id: String,
    pub stage: DocumentStage,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrip {
    pub id: String,
    pub trip_number: String,
    pub status: String,
    pub order: RemoteOrder,
    pub vehicle: RemoteVehicle,
    pub driver: RemoteDriver,
    pub timeline: Timeline,
    #[serde(default)]
    pub documents: Vec<RemoteDocument>,
}

impl RemoteTrip {
    pub fn normalize(self) -> Result<Trip, RemoteError> {
        let status = self.status.parse().map_err(RemoteError::Malformed)?;
        let assigned = self.timeline.assigned;

        let mut documents: BTreeMap<DocumentStage, Vec<Document>> = BTreeMap::new();
        for doc in self.documents {
            documents.entry(doc.stage).or_default().push(Document {
                id: doc.id,
                trip_id: self.id.clone(),
                stage: doc.stage,
                uri: doc.url,
                kind: doc.kind,
                name: doc.name,
                size: doc.size,
                uploaded_at: doc.uploaded_at,
                uploaded: true,
            });
        }

        Ok(Trip {
            id: self.id,
            trip_number: self.trip_number,
            order_number: self.order.order_number,
            vehicle_number: self.vehicle.vehicle_number,
            assigned_weight: self.order.assigned_weight,
            delivered_weight: self.order.delivered_weight,
            status,
            loading_location: self.order.loading_location.into_location(assigned),
            unloading_location: self.order.unloading_location.into_location(assigned),
            timeline: self.timeline,
            documents,
            remarks: BTreeMap::new(),
            tracking_data: Vec::new(),
        })
    }

    pub fn from_trip(trip: &Trip, driver: RemoteDriver) -> Self {
        Self {
            id: trip.id.clone(),
            trip_number: trip.trip_number.clone(),
            status: trip.status.to_string(),
            order: RemoteOrder {
                order_number: trip.order_number.clone(),
                assigned_weight: trip.assigned_weight,
                delivered_weight: trip.delivered_weight,
                loading_location: RemoteLocation::from(&trip.loading_location),
                unloading_location: RemoteLocation::from(&trip.unloading_location),
            },
            vehicle: RemoteVehicle {
                vehicle_number: trip.vehicle_number.clone(),
            },
            driver,
            timeline: trip.timeline.clone(),
            documents: trip
                .all_documents()
                .into_iter()
                .filter(|doc| doc.uploaded)
                .map(|doc| RemoteDocument {
                    id: doc.id,
                    stage: doc.stage,
                    url: doc.uri,
                    kind: doc.kind,
                    name: doc.name,
                    size: doc.size,
                    uploaded_at: doc.uploaded_at,
                })
                .collect(),
        }
    }
}

impl RemoteLocation {
    fn into_location(self, fallback_timestamp: DateTime<Utc>) -> Location {
        Location {
            address: self.address,
            coordinates: LocationCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
                accuracy: self.accuracy.unwrap_or(DEFAULT_FIX_ACCURACY_M),
                timestamp: self.timestamp.unwrap_or(fallback_timestamp),
            },
            contact_person: Contact {
                name: self.contact_name,
                phone: self.contact_phone,
            },
        }
    }
}

impl From<&Location> for RemoteLocation {
    fn from(location: &Location) -> Self {
        Self {
            address: location.address.clone(),
            latitude: location.coordinates.latitude,
            longitude: location.coordinates.longitude,
            accuracy: Some(location.coordinates.accuracy),
            timestamp: Some(location.coordinates.timestamp),
            contact_name: location.contact_person.name.clone(),
            contact_phone: location.contact_person.phone.clone(),
        }
    }
}
