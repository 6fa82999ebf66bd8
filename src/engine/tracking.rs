use crate::models::tracking::{LocationPoint, LocationSample};
use crate::models::trip::{Trip, TripStatus};

pub fn is_tracking_active(status: TripStatus) -> bool {
    match status {
        TripStatus::InProgress | TripStatus::Loaded | TripStatus::Arrived => true,
        TripStatus::Assigned | TripStatus::Completed => false,
    }
}

/// Appends `sample` to the trip's tracking log when tracking is active.
///
/// Returns `None` when the sample is dropped: tracking inactive, or the fix
/// is outside valid coordinate ranges.
pub fn record_sample(trip: &Trip, sample: &LocationSample) -> Option<Trip> {
    if !is_tracking_active(trip.status) || !sample_in_range(sample) {
        return None;
    }

    let next_id = trip.tracking_data.last().map_or(1, |point| point.id + 1);

    let mut next = trip.clone();
    next.tracking_data.push(LocationPoint {
        id: next_id,
        trip_id: trip.id.clone(),
        latitude: sample.latitude,
        longitude: sample.longitude,
        accuracy: sample.accuracy,
        timestamp: sample.timestamp,
        uploaded: false,
    });

    Some(next)
}

pub fn last_known_position(trip: &Trip) -> Option<&LocationPoint> {
    trip.tracking_data.last()
}

fn sample_in_range(sample: &LocationSample) -> bool {
    (-90.0..=90.0).contains(&sample.latitude)
        && (-180.0..=180.0).contains(&sample.longitude)
        && sample.accuracy > 0.0
}
