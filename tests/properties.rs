//! Property tests for the trip lifecycle engine.

mod common;

use chrono::Duration;
use proptest::prelude::*;

use common::{base_time, file, sample, trip_in};
use trip_workflow::engine::credentials::validate_login_credentials;
use trip_workflow::engine::gating::{build_documents, validate_file, validate_for_completion, MAX_FILE_BYTES};
use trip_workflow::engine::navigation::resolve_navigation;
use trip_workflow::engine::status::{propose_transition, validate_trip};
use trip_workflow::engine::tracking::{is_tracking_active, record_sample};
use trip_workflow::models::document::{Document, DocumentStage, DocumentType};
use trip_workflow::models::trip::{Trip, TripStatus};
use trip_workflow::remote::memory::sample_trip;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_status() -> impl Strategy<Value = TripStatus> {
    prop_oneof![
        Just(TripStatus::Assigned),
        Just(TripStatus::InProgress),
        Just(TripStatus::Loaded),
        Just(TripStatus::Arrived),
        Just(TripStatus::Completed),
    ]
}

fn arb_stage() -> impl Strategy<Value = DocumentStage> {
    prop_oneof![Just(DocumentStage::Loading), Just(DocumentStage::Unloading)]
}

fn documents_for(stages: &[DocumentStage]) -> Vec<Document> {
    stages
        .iter()
        .enumerate()
        .flat_map(|(i, stage)| {
            build_documents(
                "trip-prop",
                *stage,
                &[file(&format!("doc-{i}.jpg"), 1024, DocumentType::Image)],
                base_time(),
            )
        })
        .collect()
}

/// Walks an assigned trip forward `steps` times with arbitrary gaps, some of
/// them negative to simulate clock skew.
fn walk(steps: usize, gaps: &[i64]) -> Trip {
    let mut trip = sample_trip("trip-walk", base_time());
    let mut at = base_time();
    for gap in gaps.iter().take(steps) {
        at += Duration::minutes(*gap);
        let target = trip.status.next().unwrap();
        trip = propose_transition(&trip, target, at).unwrap().trip;
    }
    trip
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Only the immediately following status is accepted.
    #[test]
    fn transitions_are_forward_only(current in arb_status(), target in arb_status()) {
        let trip = trip_in(current);
        let result = propose_transition(&trip, target, base_time() + Duration::days(1));
        prop_assert_eq!(result.is_ok(), current.next() == Some(target));
    }

    /// Timeline fields are present exactly for the statuses reached so far.
    #[test]
    fn timeline_matches_status(steps in 0usize..=4, gaps in prop::collection::vec(-90i64..240, 4)) {
        let trip = walk(steps, &gaps);

        prop_assert!(validate_trip(&trip).is_ok());
        for status in TripStatus::ALL {
            prop_assert_eq!(trip.timeline.stamp_for(status).is_some(), status <= trip.status);
        }
        prop_assert_eq!(
            trip.status == TripStatus::Arrived,
            trip.timeline.arrived.is_some() && trip.timeline.completed.is_none()
        );

        let stamps: Vec<_> = TripStatus::ALL
            .iter()
            .filter_map(|status| trip.timeline.stamp_for(*status))
            .collect();
        prop_assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    /// Dropping any reached stamp after `assigned` makes the trip inconsistent.
    #[test]
    fn missing_stamp_is_rejected(steps in 1usize..=4, gaps in prop::collection::vec(0i64..120, 4)) {
        let mut trip = walk(steps, &gaps);
        match trip.status {
            TripStatus::InProgress => trip.timeline.started = None,
            TripStatus::Loaded => trip.timeline.loaded = None,
            TripStatus::Arrived => trip.timeline.arrived = None,
            TripStatus::Completed => trip.timeline.completed = None,
            TripStatus::Assigned => unreachable!(),
        }
        prop_assert!(validate_trip(&trip).is_err());
    }

    /// Completion needs at least one document of each stage.
    #[test]
    fn completion_requires_both_stages(stages in prop::collection::vec(arb_stage(), 0..8)) {
        let documents = documents_for(&stages);
        let check = validate_for_completion(&documents);

        let has_loading = stages.contains(&DocumentStage::Loading);
        let has_unloading = stages.contains(&DocumentStage::Unloading);
        prop_assert_eq!(check.is_valid, has_loading && has_unloading);

        if has_loading && !has_unloading {
            prop_assert_eq!(
                check.errors,
                vec!["At least one unloading document is required".to_string()]
            );
        }
    }

    /// Loading and unloading navigation are never offered together.
    #[test]
    fn navigation_is_exclusive(status in arb_status()) {
        let flags = resolve_navigation(status);
        prop_assert!(!(flags.show_loading_nav && flags.show_unloading_nav));
        if status == TripStatus::Completed {
            prop_assert!(!flags.show_loading_nav && !flags.show_unloading_nav);
        }
    }

    /// Tracking runs exactly while the trip is underway.
    #[test]
    fn tracking_follows_status(status in arb_status(), lat in -90.0f64..90.0, lng in -180.0f64..180.0) {
        let underway = matches!(
            status,
            TripStatus::InProgress | TripStatus::Loaded | TripStatus::Arrived
        );
        prop_assert_eq!(is_tracking_active(status), underway);

        let trip = trip_in(status);
        let recorded = record_sample(&trip, &sample(lat, lng));
        prop_assert_eq!(recorded.is_some(), underway);

        if status == TripStatus::Assigned {
            prop_assert!(trip.tracking_data.is_empty());
        }
        if let Some(next) = recorded {
            prop_assert_eq!(&next.tracking_data[..trip.tracking_data.len()], &trip.tracking_data[..]);
        }
    }

    /// Credential validation is deterministic and ignores surrounding whitespace.
    #[test]
    fn credential_validation_is_deterministic(email in ".{0,24}", password in ".{0,16}") {
        prop_assert_eq!(
            validate_login_credentials(&email, &password),
            validate_login_credentials(&email, &password)
        );
    }

    #[test]
    fn empty_email_is_always_invalid(password in "[a-zA-Z0-9]{6,20}") {
        let result = validate_login_credentials("", &password);
        prop_assert!(!result.is_valid);
        prop_assert!(result.error.unwrap_or_default().contains("Email"));
    }

    #[test]
    fn padding_does_not_change_validity(
        email in "[a-z]{1,8}@[a-z]{1,8}\\.[a-z]{2,3}",
        password in "[a-z0-9]{6,12}",
        pad in "[ \t]{0,3}",
    ) {
        let plain = validate_login_credentials(&email, &password);
        let padded = validate_login_credentials(
            &format!("{pad}{email}{pad}"),
            &format!("{pad}{password}{pad}"),
        );
        prop_assert!(plain.is_valid);
        prop_assert_eq!(plain.is_valid, padded.is_valid);
    }

    /// Accepted image extensions under the size limit pass.
    #[test]
    fn allowed_images_pass(
        stem in "[a-z]{1,10}",
        ext in prop_oneof![Just("jpg"), Just("jpeg"), Just("png"), Just("PNG")],
        size in 0u64..=MAX_FILE_BYTES,
    ) {
        let result = validate_file(&file(&format!("{stem}.{ext}"), size, DocumentType::Image));
        prop_assert!(result.is_valid);
    }

    #[test]
    fn other_image_formats_fail(
        stem in "[a-z]{1,10}",
        ext in prop_oneof![Just("gif"), Just("bmp"), Just("heic"), Just("pdf")],
    ) {
        let result = validate_file(&file(&format!("{stem}.{ext}"), 100 * 1024, DocumentType::Image));
        prop_assert!(!result.is_valid);
        prop_assert!(result.errors.iter().any(|err| err.contains("Invalid image format")));
    }

    /// Oversized files fail regardless of type.
    #[test]
    fn oversized_files_fail(
        size in (MAX_FILE_BYTES + 1)..(MAX_FILE_BYTES * 3),
        kind in prop_oneof![Just(DocumentType::Image), Just(DocumentType::Pdf)],
    ) {
        let name = match kind {
            DocumentType::Image => "photo.png",
            DocumentType::Pdf => "challan.pdf",
        };
        let result = validate_file(&file(name, size, kind));
        prop_assert!(!result.is_valid);
        prop_assert!(result.errors.iter().any(|err| err.contains("File size exceeds limit")));
    }

    /// JSON round trip keeps identity, status, timeline and document order.
    #[test]
    fn trip_survives_json_round_trip(status in arb_status(), extra in prop::collection::vec(arb_stage(), 0..6)) {
        let mut trip = trip_in(status);
        for doc in documents_for(&extra) {
            trip.documents.entry(doc.stage).or_default().push(doc);
        }

        let json = serde_json::to_string(&trip).unwrap();
        let decoded: Trip = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(&decoded.id, &trip.id);
        prop_assert_eq!(decoded.status, trip.status);
        prop_assert_eq!(&decoded.timeline, &trip.timeline);
        prop_assert_eq!(&decoded.documents, &trip.documents);
        prop_assert_eq!(decoded.all_documents(), trip.all_documents());
    }
}
