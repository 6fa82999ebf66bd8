use serde::Serialize;

use crate::engine::gating::{active_stage, validate_for_completion};
use crate::engine::navigation::{resolve_destination, resolve_navigation, Destination, NavigationFlags};
use crate::engine::tracking::is_tracking_active;
use crate::models::document::DocumentStage;
use crate::models::trip::{Trip, TripAction, TripStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NextAction {
    pub action: TripAction,
    pub target_status: TripStatus,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveNavigation {
    #[serde(flatten)]
    pub flags: NavigationFlags,
    pub destination: Option<Destination>,
    pub unavailable_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadRequirement {
    pub stage: DocumentStage,
    pub uploaded: usize,
    pub pending: usize,
    /// No document of this stage exists yet, so the driver must capture one.
    pub required: bool,
}

/// Read-only projection of a trip for the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TripViewModel {
    pub trip_id: String,
    pub status: TripStatus,
    pub next_action: Option<NextAction>,
    pub active_navigation: ActiveNavigation,
    pub tracking_active: bool,
    pub upload_requirement: Option<UploadRequirement>,
    pub completion_blockers: Vec<String>,
    pub can_call_contacts: bool,
    pub tracking_points: usize,
}

/// Derives the view model. Pure: the same trip always yields the same model.
pub fn derive_view_model(trip: &Trip) -> TripViewModel {
    let completion_blockers = completion_blockers(trip);
    let flags = resolve_navigation(trip.status);

    let next_action = trip.status.next().and_then(|target| {
        target.entry_action().map(|action| NextAction {
            action,
            target_status: target,
            enabled: target != TripStatus::Completed || completion_blockers.is_empty(),
        })
    });

    let active_navigation = match resolve_destination(trip) {
        Ok(destination) => ActiveNavigation {
            flags,
            destination,
            unavailable_reason: None,
        },
        Err(err) => ActiveNavigation {
            flags: NavigationFlags::hidden(flags.can_call),
            destination: None,
            unavailable_reason: Some(err.to_string()),
        },
    };

    let upload_requirement = active_stage(trip.status).map(|stage| {
        let documents = trip.documents_for(stage);
        let uploaded = documents.iter().filter(|doc| doc.uploaded).count();
        UploadRequirement {
            stage,
            uploaded,
            pending: documents.len() - uploaded,
            required: documents.is_empty(),
        }
    });

    TripViewModel {
        trip_id: trip.id.clone(),
        status: trip.status,
        next_action,
        active_navigation,
        tracking_active: is_tracking_active(trip.status),
        upload_requirement,
        completion_blockers,
        can_call_contacts: flags.can_call,
        tracking_points: trip.tracking_data.len(),
    }
}

/// Blockers are only reported once the trip is one step away from completion.
fn completion_blockers(trip: &Trip) -> Vec<String> {
    if trip.status != TripStatus::Arrived {
        return Vec::new();
    }
    validate_for_completion(&trip.all_documents()).errors
}
