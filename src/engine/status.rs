use chrono::{DateTime, Utc};

use crate::error::LifecycleError;
use crate::models::trip::{Timeline, Trip, TripStatus};

/// Observable tracking side effect of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingChange {
    Started,
    Stopped,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub trip: Trip,
    pub tracking: TrackingChange,
}

/// Applies `target` to `trip` if it is exactly the next status.
///
/// The input trip is checked first; a trip whose timeline disagrees with its
/// status is rejected rather than advanced. The new timeline field is stamped
/// with `now`, clamped so it never precedes the previous stamp.
pub fn propose_transition(
    trip: &Trip,
    target: TripStatus,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    validate_trip(trip)?;

    if trip.status.next() != Some(target) {
        return Err(LifecycleError::InvalidTransition {
            from: trip.status,
            to: target,
        });
    }

    let previous = trip.timeline.latest();
    let stamp = if now < previous { previous } else { now };

    let mut next = trip.clone();
    next.status = target;
    next.timeline.set_stamp(target, stamp);

    let tracking = match target {
        TripStatus::InProgress => TrackingChange::Started,
        TripStatus::Completed => TrackingChange::Stopped,
        TripStatus::Assigned | TripStatus::Loaded | TripStatus::Arrived => {
            TrackingChange::Unchanged
        }
    };

    Ok(Transition {
        trip: next,
        tracking,
    })
}

/// Checks the status/timeline correspondence and timeline ordering.
pub fn validate_trip(trip: &Trip) -> Result<(), LifecycleError> {
    validate_timeline(trip.status, &trip.timeline)?;

    if trip.status == TripStatus::Assigned && !trip.tracking_data.is_empty() {
        return Err(LifecycleError::InconsistentTimeline(format!(
            "trip {} is Assigned but has {} tracking points",
            trip.id,
            trip.tracking_data.len()
        )));
    }

    Ok(())
}

pub fn validate_timeline(status: TripStatus, timeline: &Timeline) -> Result<(), LifecycleError> {
    let mut previous = timeline.assigned;

    for candidate in &TripStatus::ALL[1..] {
        let reached = *candidate <= status;
        match (reached, timeline.stamp_for(*candidate)) {
            (true, Some(at)) => {
                if at < previous {
                    return Err(LifecycleError::InconsistentTimeline(format!(
                        "{candidate} timestamp {at} precedes previous stamp {previous}"
                    )));
                }
                previous = at;
            }
            (true, None) => {
                return Err(LifecycleError::InconsistentTimeline(format!(
                    "status {status} requires a {candidate} timestamp"
                )));
            }
            (false, Some(_)) => {
                return Err(LifecycleError::InconsistentTimeline(format!(
                    "status {status} must not carry a {candidate} timestamp"
                )));
            }
            (false, None) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{propose_transition, validate_trip, TrackingChange};
    use crate::engine::testing::trip_in;
    use crate::error::LifecycleError;
    use crate::models::trip::TripStatus;

    #[test]
    fn advances_one_step_and_stamps_timeline() {
        let trip = trip_in(TripStatus::Assigned);
        let now = trip.timeline.assigned + Duration::minutes(5);

        let transition = propose_transition(&trip, TripStatus::InProgress, now).unwrap();

        assert_eq!(transition.trip.status, TripStatus::InProgress);
        assert_eq!(transition.trip.timeline.started, Some(now));
        assert_eq!(transition.tracking, TrackingChange::Started);
        assert_eq!(trip.status, TripStatus::Assigned);
    }

    #[test]
    fn rejects_skips_and_reversals() {
        let assigned = trip_in(TripStatus::Assigned);
        let err = propose_transition(&assigned, TripStatus::Loaded, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: TripStatus::Assigned,
                to: TripStatus::Loaded
            }
        );

        let loaded = trip_in(TripStatus::Loaded);
        assert!(matches!(
            propose_transition(&loaded, TripStatus::InProgress, Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let completed = trip_in(TripStatus::Completed);
        assert!(propose_transition(&completed, TripStatus::Completed, Utc::now()).is_err());
    }

    #[test]
    fn completion_stops_tracking_without_clearing_points() {
        let arrived = trip_in(TripStatus::Arrived);
        let points = arrived.tracking_data.len();
        assert!(points > 0);

        let transition = propose_transition(&arrived, TripStatus::Completed, Utc::now()).unwrap();
        assert_eq!(transition.tracking, TrackingChange::Stopped);
        assert_eq!(transition.trip.tracking_data.len(), points);
    }

    #[test]
    fn skewed_clock_is_clamped_to_previous_stamp() {
        let trip = trip_in(TripStatus::InProgress);
        let started = trip.timeline.started.unwrap();
        let skewed = started - Duration::hours(2);

        let transition = propose_transition(&trip, TripStatus::Loaded, skewed).unwrap();
        assert_eq!(transition.trip.timeline.loaded, Some(started));
    }

    #[test]
    fn rejects_timeline_missing_a_reached_stamp() {
        let mut trip = trip_in(TripStatus::Loaded);
        trip.timeline.started = None;

        assert!(matches!(
            propose_transition(&trip, TripStatus::Arrived, Utc::now()),
            Err(LifecycleError::InconsistentTimeline(_))
        ));
    }

    #[test]
    fn rejects_timeline_with_future_stamp() {
        let mut trip = trip_in(TripStatus::InProgress);
        trip.timeline.arrived = Some(Utc::now());
        assert!(matches!(validate_trip(&trip), Err(LifecycleError::InconsistentTimeline(_))));
    }

    #[test]
    fn rejects_out_of_order_timeline() {
        let mut trip = trip_in(TripStatus::Loaded);
        trip.timeline.loaded = Some(trip.timeline.assigned - Duration::minutes(1));
        assert!(validate_trip(&trip).is_err());
    }

    #[test]
    fn assigned_trip_with_tracking_points_is_inconsistent() {
        let mut trip = trip_in(TripStatus::Assigned);
        trip.tracking_data = trip_in(TripStatus::Loaded).tracking_data;
        assert!(matches!(validate_trip(&trip), Err(LifecycleError::InconsistentTimeline(_))));
    }
}
