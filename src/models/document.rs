use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStage {
    Loading,
    Unloading,
}

impl DocumentStage {
    pub const ALL: [DocumentStage; 2] = [DocumentStage::Loading, DocumentStage::Unloading];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStage::Loading => "loading",
            DocumentStage::Unloading => "unloading",
        }
    }

    /// Multipart field name the remote expects for files of this stage.
    pub fn upload_field(self) -> &'static str {
        match self {
            DocumentStage::Loading => "loadingDocuments",
            DocumentStage::Unloading => "unloadingDocuments",
        }
    }
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStage {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "loading" => Ok(DocumentStage::Loading),
            "unloading" => Ok(DocumentStage::Unloading),
            other => Err(format!("unknown stage: {other}, expected loading/unloading")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Image,
    Pdf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub trip_id: String,
    pub stage: DocumentStage,
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded: bool,
}

impl Document {
    pub fn mime_type(&self) -> &'static str {
        match self.kind {
            DocumentType::Pdf => "application/pdf",
            DocumentType::Image => {
                if self.name.to_ascii_lowercase().ends_with(".png") {
                    "image/png"
                } else {
                    "image/jpeg"
                }
            }
        }
    }
}

/// A file handed over by the capture provider, not yet accepted as a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileCandidate {
    pub uri: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: DocumentType,
}
