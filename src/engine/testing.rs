use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::engine::gating::build_documents;
use crate::engine::status::propose_transition;
use crate::engine::tracking::record_sample;
use crate::models::document::{DocumentStage, DocumentType, FileCandidate};
use crate::models::tracking::LocationSample;
use crate::models::trip::{Trip, TripStatus};
use crate::remote::memory::sample_trip;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn photo(name: &str, size: u64) -> FileCandidate {
    FileCandidate {
        uri: format!("file:///captures/{name}"),
        name: name.to_string(),
        size,
        kind: DocumentType::Image,
    }
}

/// Walks a freshly assigned trip forward to `status`, recording a couple of
/// tracking samples and the documents each stage would normally carry.
pub fn trip_in(status: TripStatus) -> Trip {
    let mut trip = sample_trip("trip-1", base_time());
    let mut at = base_time();

    while trip.status < status {
        let target = trip.status.next().unwrap();
        at += Duration::minutes(30);
        trip = propose_transition(&trip, target, at).unwrap().trip;

        match target {
            TripStatus::InProgress => {
                for step in 0..2 {
                    let sample = LocationSample {
                        latitude: 19.07 + f64::from(step) * 0.01,
                        longitude: 72.87,
                        accuracy: 5.0,
                        timestamp: at + Duration::minutes(i64::from(step)),
                    };
                    trip = record_sample(&trip, &sample).unwrap();
                }
                let docs = build_documents(&trip.id, DocumentStage::Loading, &[photo("bill.jpg", 1024)], at);
                trip.documents.insert(DocumentStage::Loading, docs);
            }
            TripStatus::Arrived => {
                let docs =
                    build_documents(&trip.id, DocumentStage::Unloading, &[photo("pod.png", 2048)], at);
                trip.documents.insert(DocumentStage::Unloading, docs);
            }
            TripStatus::Assigned | TripStatus::Loaded | TripStatus::Completed => {}
        }
    }

    trip
}
