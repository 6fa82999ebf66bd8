use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::document::{Document, DocumentStage};
use crate::models::tracking::LocationPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TripStatus {
    Assigned,
    InProgress,
    Loaded,
    Arrived,
    Completed,
}

impl TripStatus {
    pub const ALL: [TripStatus; 5] = [
        TripStatus::Assigned,
        TripStatus::InProgress,
        TripStatus::Loaded,
        TripStatus::Arrived,
        TripStatus::Completed,
    ];

    /// The only status reachable from `self`, or `None` once completed.
    pub fn next(self) -> Option<TripStatus> {
        match self {
            TripStatus::Assigned => Some(TripStatus::InProgress),
            TripStatus::InProgress => Some(TripStatus::Loaded),
            TripStatus::Loaded => Some(TripStatus::Arrived),
            TripStatus::Arrived => Some(TripStatus::Completed),
            TripStatus::Completed => None,
        }
    }

    /// The action that moves a trip *into* this status.
    pub fn entry_action(self) -> Option<TripAction> {
        match self {
            TripStatus::Assigned => None,
            TripStatus::InProgress => Some(TripAction::Start),
            TripStatus::Loaded => Some(TripAction::MarkLoaded),
            TripStatus::Arrived => Some(TripAction::MarkArrived),
            TripStatus::Completed => Some(TripAction::Complete),
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TripStatus::Assigned => "Assigned",
            TripStatus::InProgress => "InProgress",
            TripStatus::Loaded => "Loaded",
            TripStatus::Arrived => "Arrived",
            TripStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "assigned" => Ok(TripStatus::Assigned),
            "inprogress" | "started" => Ok(TripStatus::InProgress),
            "loaded" => Ok(TripStatus::Loaded),
            "arrived" => Ok(TripStatus::Arrived),
            "completed" | "delivered" => Ok(TripStatus::Completed),
            _ => Err(format!("unknown trip status: {raw}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TripAction {
    Start,
    MarkLoaded,
    MarkArrived,
    Complete,
}

impl TripAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TripAction::Start => "start",
            TripAction::MarkLoaded => "mark-loaded",
            TripAction::MarkArrived => "mark-arrived",
            TripAction::Complete => "complete",
        }
    }

    pub fn target_status(self) -> TripStatus {
        match self {
            TripAction::Start => TripStatus::InProgress,
            TripAction::MarkLoaded => TripStatus::Loaded,
            TripAction::MarkArrived => TripStatus::Arrived,
            TripAction::Complete => TripStatus::Completed,
        }
    }
}

impl fmt::Display for TripAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "start" => Ok(TripAction::Start),
            "mark-loaded" => Ok(TripAction::MarkLoaded),
            "mark-arrived" => Ok(TripAction::MarkArrived),
            "complete" => Ok(TripAction::Complete),
            other => Err(format!(
                "unknown action: {other}, expected start/mark-loaded/mark-arrived/complete"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationCoordinates {
    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub coordinates: LocationCoordinates,
    pub contact_person: Contact,
}

impl Location {
    pub fn is_navigable(&self) -> bool {
        !self.address.trim().is_empty() && self.coordinates.is_in_range()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub assigned: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub loaded: Option<DateTime<Utc>>,
    pub arrived: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

impl Timeline {
    pub fn assigned_at(at: DateTime<Utc>) -> Self {
        Self {
            assigned: at,
            started: None,
            loaded: None,
            arrived: None,
            completed: None,
        }
    }

    /// The timestamp recorded when `status` was entered.
    pub fn stamp_for(&self, status: TripStatus) -> Option<DateTime<Utc>> {
        match status {
            TripStatus::Assigned => Some(self.assigned),
            TripStatus::InProgress => self.started,
            TripStatus::Loaded => self.loaded,
            TripStatus::Arrived => self.arrived,
            TripStatus::Completed => self.completed,
        }
    }

    pub(crate) fn set_stamp(&mut self, status: TripStatus, at: DateTime<Utc>) {
        match status {
            TripStatus::Assigned => self.assigned = at,
            TripStatus::InProgress => self.started = Some(at),
            TripStatus::Loaded => self.loaded = Some(at),
            TripStatus::Arrived => self.arrived = Some(at),
            TripStatus::Completed => self.completed = Some(at),
        }
    }

    /// Latest stamp present, in timeline order.
    pub fn latest(&self) -> DateTime<Utc> {
        TripStatus::ALL
            .iter()
            .rev()
            .find_map(|status| self.stamp_for(*status))
            .unwrap_or(self.assigned)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: String,
    pub trip_number: String,
    pub order_number: String,
    pub vehicle_number: String,
    pub assigned_weight: f64,
    pub delivered_weight: Option<f64>,
    pub status: TripStatus,
    pub loading_location: Location,
    pub unloading_location: Location,
    pub timeline: Timeline,
    #[serde(default)]
    pub documents: BTreeMap<DocumentStage, Vec<Document>>,
    #[serde(default)]
    pub remarks: BTreeMap<DocumentStage, String>,
    #[serde(default)]
    pub tracking_data: Vec<LocationPoint>,
}

impl Trip {
    pub fn documents_for(&self, stage: DocumentStage) -> &[Document] {
        self.documents
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All documents across both stages, loading first, each stage in upload order.
    pub fn all_documents(&self) -> Vec<Document> {
        DocumentStage::ALL
            .iter()
            .flat_map(|stage| self.documents_for(*stage).iter().cloned())
            .collect()
    }

    pub fn location_for(&self, stage: DocumentStage) -> &Location {
        match stage {
            DocumentStage::Loading => &self.loading_location,
            DocumentStage::Unloading => &self.unloading_location,
        }
    }
}
