use serde::Serialize;

use crate::engine::tracking::last_known_position;
use crate::error::LifecycleError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::document::DocumentStage;
use crate::models::trip::{Contact, Trip, TripStatus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NavigationFlags {
    pub active_location: Option<DocumentStage>,
    pub show_loading_nav: bool,
    pub show_unloading_nav: bool,
    pub can_call: bool,
}

impl NavigationFlags {
    pub fn hidden(can_call: bool) -> Self {
        Self {
            active_location: None,
            show_loading_nav: false,
            show_unloading_nav: false,
            can_call,
        }
    }
}

/// Where the map provider should route the driver.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Destination {
    pub stage: DocumentStage,
    pub address: String,
    pub position: GeoPoint,
    pub contact: Contact,
    pub distance_km: Option<f64>,
}

pub fn resolve_navigation(status: TripStatus) -> NavigationFlags {
    let active_location = match status {
        TripStatus::Assigned | TripStatus::InProgress => Some(DocumentStage::Loading),
        TripStatus::Loaded | TripStatus::Arrived => Some(DocumentStage::Unloading),
        TripStatus::Completed => None,
    };

    NavigationFlags {
        active_location,
        show_loading_nav: active_location == Some(DocumentStage::Loading),
        show_unloading_nav: active_location == Some(DocumentStage::Unloading),
        can_call: status != TripStatus::Completed,
    }
}

/// Resolves the active destination; `Ok(None)` once the trip is completed.
pub fn resolve_destination(trip: &Trip) -> Result<Option<Destination>, LifecycleError> {
    let Some(stage) = resolve_navigation(trip.status).active_location else {
        return Ok(None);
    };

    let location = trip.location_for(stage);
    if !location.is_navigable() {
        return Err(LifecycleError::LocationUnavailable(stage));
    }

    let position = GeoPoint::from(&location.coordinates);
    let distance_km =
        last_known_position(trip).map(|point| haversine_km(&GeoPoint::from(point), &position));

    Ok(Some(Destination {
        stage,
        address: location.address.clone(),
        position,
        contact: location.contact_person.clone(),
        distance_km,
    }))
}

#[cfg(test)]
mod tests {
    use super::{resolve_destination, resolve_navigation};
    use crate::engine::testing::trip_in;
    use crate::error::LifecycleError;
    use crate::models::document::DocumentStage;
    use crate::models::trip::TripStatus;

    #[test]
    fn loading_and_unloading_nav_are_exclusive() {
        for status in TripStatus::ALL {
            let flags = resolve_navigation(status);
            assert!(!(flags.show_loading_nav && flags.show_unloading_nav), "{status}");
        }
        let completed = resolve_navigation(TripStatus::Completed);
        assert!(!completed.show_loading_nav && !completed.show_unloading_nav);
        assert!(!completed.can_call);
        assert!(resolve_navigation(TripStatus::Arrived).can_call);
    }

    #[test]
    fn destination_switches_after_loading() {
        let assigned = resolve_destination(&trip_in(TripStatus::Assigned)).unwrap().unwrap();
        assert_eq!(assigned.stage, DocumentStage::Loading);
        assert!(assigned.distance_km.is_none());

        let loaded = resolve_destination(&trip_in(TripStatus::Loaded)).unwrap().unwrap();
        assert_eq!(loaded.stage, DocumentStage::Unloading);
        assert!(loaded.distance_km.unwrap() > 0.0);

        assert_eq!(resolve_destination(&trip_in(TripStatus::Completed)), Ok(None));
    }

    #[test]
    fn blank_address_is_unavailable() {
        let mut trip = trip_in(TripStatus::InProgress);
        trip.loading_location.address = "   ".to_string();
        assert_eq!(
            resolve_destination(&trip),
            Err(LifecycleError::LocationUnavailable(DocumentStage::Loading))
        );
    }

    #[test]
    fn out_of_range_coordinates_are_unavailable() {
        let mut trip = trip_in(TripStatus::Arrived);
        trip.unloading_location.coordinates.longitude = 200.0;
        assert!(resolve_destination(&trip).is_err());
    }
}
