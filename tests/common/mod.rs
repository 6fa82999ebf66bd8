#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use trip_workflow::engine::gating::build_documents;
use trip_workflow::engine::status::propose_transition;
use trip_workflow::engine::tracking::record_sample;
use trip_workflow::models::document::{DocumentStage, DocumentType, FileCandidate};
use trip_workflow::models::tracking::LocationSample;
use trip_workflow::models::trip::{Trip, TripStatus};
use trip_workflow::remote::memory::sample_trip;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn file(name: &str, size: u64, kind: DocumentType) -> FileCandidate {
    FileCandidate {
        uri: format!("file:///captures/{name}"),
        name: name.to_string(),
        size,
        kind,
    }
}

pub fn sample(latitude: f64, longitude: f64) -> LocationSample {
    LocationSample {
        latitude,
        longitude,
        accuracy: 6.0,
        timestamp: base_time(),
    }
}

/// A trip walked forward to `status`, with one tracking point and the
/// documents each passed stage normally carries.
pub fn trip_in(status: TripStatus) -> Trip {
    let mut trip = sample_trip("trip-prop", base_time());
    let mut at = base_time();

    while trip.status < status {
        let target = trip.status.next().unwrap();
        at += Duration::minutes(45);
        trip = propose_transition(&trip, target, at).unwrap().trip;

        match target {
            TripStatus::InProgress => {
                trip = record_sample(&trip, &sample(19.1, 73.0)).unwrap();
                let docs = build_documents(
                    &trip.id,
                    DocumentStage::Loading,
                    &[file("weighbridge.jpg", 4096, DocumentType::Image)],
                    at,
                );
                trip.documents.insert(DocumentStage::Loading, docs);
            }
            TripStatus::Arrived => {
                let docs = build_documents(
                    &trip.id,
                    DocumentStage::Unloading,
                    &[file("pod.pdf", 8192, DocumentType::Pdf)],
                    at,
                );
                trip.documents.insert(DocumentStage::Unloading, docs);
            }
            TripStatus::Assigned | TripStatus::Loaded | TripStatus::Completed => {}
        }
    }

    trip
}
