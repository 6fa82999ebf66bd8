use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::models::document::{Document, DocumentStage, DocumentType, FileCandidate};
use crate::models::trip::{Trip, TripStatus};

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const PDF_EXTENSIONS: [&str; 1] = ["pdf"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// The status during which documents of `stage` may be uploaded.
pub fn active_status_for(stage: DocumentStage) -> TripStatus {
    match stage {
        DocumentStage::Loading => TripStatus::InProgress,
        DocumentStage::Unloading => TripStatus::Arrived,
    }
}

/// The stage that currently accepts uploads, if any.
pub fn active_stage(status: TripStatus) -> Option<DocumentStage> {
    match status {
        TripStatus::InProgress => Some(DocumentStage::Loading),
        TripStatus::Arrived => Some(DocumentStage::Unloading),
        TripStatus::Assigned | TripStatus::Loaded | TripStatus::Completed => None,
    }
}

pub fn validate_for_upload(trip: &Trip, stage: DocumentStage) -> Result<(), LifecycleError> {
    if trip.status == active_status_for(stage) {
        Ok(())
    } else {
        Err(LifecycleError::StageNotActive {
            stage,
            status: trip.status,
        })
    }
}

pub fn validate_file(candidate: &FileCandidate) -> FileValidation {
    let mut errors = Vec::new();
    let extension = extension_of(&candidate.name);

    if candidate.name.trim().is_empty() {
        errors.push("File name is required".to_string());
    }

    match candidate.kind {
        DocumentType::Image => {
            if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
                errors.push(format!(
                    "Invalid image format. Allowed: {}",
                    IMAGE_EXTENSIONS.join(", ")
                ));
            }
        }
        DocumentType::Pdf => {
            if !PDF_EXTENSIONS.contains(&extension.as_str()) {
                errors.push("Invalid document format. Allowed: pdf".to_string());
            }
        }
    }

    if candidate.size > MAX_FILE_BYTES {
        errors.push(size_limit_error());
    }

    FileValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Checks the length found on disk for a captured file. The declared size is
/// client input, so the real length must respect the limit and match it.
pub fn validate_captured_size(candidate: &FileCandidate, actual: u64) -> Vec<String> {
    if actual > MAX_FILE_BYTES {
        vec![size_limit_error()]
    } else if actual != candidate.size {
        vec![format!(
            "File size does not match the captured file ({} bytes declared, {actual} on disk)",
            candidate.size
        )]
    } else {
        Vec::new()
    }
}

fn size_limit_error() -> String {
    format!(
        "File size exceeds limit of {} MB",
        MAX_FILE_BYTES / (1024 * 1024)
    )
}

/// Validates a whole capture batch, prefixing each error with its file name.
/// An empty batch counts as a validation failure.
pub fn validate_candidates(candidates: &[FileCandidate]) -> Result<(), LifecycleError> {
    if candidates.is_empty() {
        return Err(LifecycleError::InvalidFiles(vec![
            "At least one file is required".to_string(),
        ]));
    }

    let errors: Vec<String> = candidates
        .iter()
        .flat_map(|candidate| {
            validate_file(candidate)
                .errors
                .into_iter()
                .map(move |err| format!("{}: {err}", candidate.name))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::InvalidFiles(errors))
    }
}

pub fn validate_for_completion(documents: &[Document]) -> CompletionCheck {
    let mut errors = Vec::new();

    for stage in DocumentStage::ALL {
        if !documents.iter().any(|doc| doc.stage == stage) {
            errors.push(format!("At least one {stage} document is required"));
        }
    }

    CompletionCheck {
        is_valid: errors.is_empty(),
        errors,
    }
}

pub fn build_documents(
    trip_id: &str,
    stage: DocumentStage,
    candidates: &[FileCandidate],
    now: DateTime<Utc>,
) -> Vec<Document> {
    candidates
        .iter()
        .map(|candidate| Document {
            id: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            stage,
            uri: candidate.uri.clone(),
            kind: candidate.kind,
            name: candidate.name.clone(),
            size: candidate.size,
            uploaded_at: now,
            uploaded: false,
        })
        .collect()
}

fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{
        build_documents, validate_candidates, validate_captured_size, validate_file,
        validate_for_completion, validate_for_upload, MAX_FILE_BYTES,
    };
    use crate::engine::testing::{base_time, photo, trip_in};
    use crate::error::LifecycleError;
    use crate::models::document::{DocumentStage, DocumentType, FileCandidate};
    use crate::models::trip::TripStatus;

    #[test]
    fn loading_uploads_only_while_in_progress() {
        for status in TripStatus::ALL {
            let trip = trip_in(status);
            let result = validate_for_upload(&trip, DocumentStage::Loading);
            assert_eq!(result.is_ok(), status == TripStatus::InProgress, "{status}");
        }
    }

    #[test]
    fn unloading_upload_before_arrival_is_stage_not_active() {
        let trip = trip_in(TripStatus::Loaded);
        assert_eq!(
            validate_for_upload(&trip, DocumentStage::Unloading),
            Err(LifecycleError::StageNotActive {
                stage: DocumentStage::Unloading,
                status: TripStatus::Loaded
            })
        );
        assert!(validate_for_upload(&trip_in(TripStatus::Arrived), DocumentStage::Unloading).is_ok());
    }

    #[test]
    fn png_image_under_limit_is_valid() {
        let result = validate_file(&photo("photo.png", 100 * 1024));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(validate_file(&photo("SCAN.JPEG", 10)).is_valid);
    }

    #[test]
    fn gif_is_rejected_as_image() {
        let result = validate_file(&photo("photo.gif", 100 * 1024));
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("Invalid image format"));
    }

    #[test]
    fn errors_are_collected_not_short_circuited() {
        let result = validate_file(&photo("photo.gif", MAX_FILE_BYTES + 1));
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[1].contains("File size exceeds limit"));
    }

    #[test]
    fn pdf_requires_pdf_extension() {
        let mut file = FileCandidate {
            uri: "file:///captures/lr.pdf".to_string(),
            name: "lr.pdf".to_string(),
            size: 2048,
            kind: DocumentType::Pdf,
        };
        assert!(validate_file(&file).is_valid);

        file.name = "lr.docx".to_string();
        let result = validate_file(&file);
        assert!(result.errors[0].contains("Invalid document format"));
    }

    #[test]
    fn empty_batch_is_a_validation_failure() {
        assert!(matches!(validate_candidates(&[]), Err(LifecycleError::InvalidFiles(_))));
    }

    #[test]
    fn batch_errors_name_the_offending_file() {
        let err = validate_candidates(&[photo("ok.jpg", 10), photo("bad.bmp", 10)]).unwrap_err();
        assert_eq!(err.details().len(), 1);
        assert!(err.details()[0].starts_with("bad.bmp:"));
    }

    #[test]
    fn completion_requires_both_stages() {
        let loading = build_documents("t", DocumentStage::Loading, &[photo("a.jpg", 1)], base_time());
        let unloading =
            build_documents("t", DocumentStage::Unloading, &[photo("b.jpg", 1)], base_time());

        let only_loading = validate_for_completion(&loading);
        assert!(!only_loading.is_valid);
        assert_eq!(
            only_loading.errors,
            vec!["At least one unloading document is required".to_string()]
        );

        let none = validate_for_completion(&[]);
        assert_eq!(none.errors.len(), 2);

        let both: Vec<_> = loading.into_iter().chain(unloading).collect();
        assert!(validate_for_completion(&both).is_valid);
    }

    #[test]
    fn built_documents_start_unuploaded_with_unique_ids() {
        let docs = build_documents(
            "trip-9",
            DocumentStage::Loading,
            &[photo("a.jpg", 1), photo("b.jpg", 2)],
            base_time(),
        );
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|doc| !doc.uploaded && doc.trip_id == "trip-9"));
        assert!(!docs[0].id.is_empty());
        assert_ne!(docs[0].id, docs[1].id);
    }

    #[test]
    fn captured_size_must_respect_limit_and_declaration() {
        let declared_small = photo("scan.jpg", 100 * 1024);

        assert!(validate_captured_size(&declared_small, 100 * 1024).is_empty());
        assert_eq!(
            validate_captured_size(&declared_small, 11 * 1024 * 1024),
            vec!["File size exceeds limit of 10 MB".to_string()]
        );

        let mismatch = validate_captured_size(&declared_small, 200 * 1024);
        assert_eq!(mismatch.len(), 1);
        assert!(mismatch[0].starts_with("File size does not match"));

        let at_limit = photo("big.jpg", MAX_FILE_BYTES);
        assert!(validate_captured_size(&at_limit, MAX_FILE_BYTES).is_empty());
    }
}
