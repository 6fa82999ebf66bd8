use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::engine::gating::{validate_captured_size, MAX_FILE_BYTES};
use crate::error::LifecycleError;
use crate::models::document::{Document, DocumentStage, FileCandidate};
use crate::models::trip::TripAction;
use crate::remote::{
    AuthResponse, CompletionPayload, Page, RemoteError, RemoteTrip, TripService, UploadResponse,
};

/// Talks to the trip service over its REST API. Document uploads only read
/// files from inside `capture_dir`.
pub struct HttpTripService {
    client: Client,
    base_url: String,
    capture_dir: PathBuf,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

impl HttpTripService {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        capture_dir: impl Into<PathBuf>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Network(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            capture_dir: capture_dir.into(),
        })
    }

    /// Resolves a capture uri to a regular file inside the capture directory.
    async fn resolve_capture(&self, uri: &str) -> Result<(PathBuf, u64), String> {
        let root = tokio::fs::canonicalize(&self.capture_dir)
            .await
            .map_err(|_| "Capture directory is unavailable".to_string())?;

        let raw = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        let requested = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            root.join(raw)
        };

        let path = tokio::fs::canonicalize(&requested)
            .await
            .map_err(|_| "File not found".to_string())?;
        if !path.starts_with(&root) {
            return Err("File is outside the capture directory".to_string());
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((path, meta.len())),
            _ => Err("File not found".to_string()),
        }
    }

    async fn file_part(&self, document: &Document) -> Result<Part, RemoteError> {
        let (path, len) = self
            .resolve_capture(&document.uri)
            .await
            .map_err(|problem| RemoteError::LocalFile(format!("{}: {problem}", document.name)))?;
        if len > MAX_FILE_BYTES || len != document.size {
            return Err(RemoteError::LocalFile(format!(
                "{}: file changed since it was checked",
                document.name
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| RemoteError::LocalFile(format!("{}: {err}", document.name)))?;

        Part::bytes(bytes)
            .file_name(document.name.clone())
            .mime_str(document.mime_type())
            .map_err(|err| RemoteError::LocalFile(format!("{}: {err}", document.name)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|err| RemoteError::Network(err.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "trip service responded");

        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .map(|body| body.message)
                .unwrap_or(raw);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl TripService for HttpTripService {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, RemoteError> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.send_json(request).await
    }

    async fn change_password(
        &self,
        token: &str,
        current: &str,
        new: &str,
    ) -> Result<(), RemoteError> {
        let request = self
            .client
            .post(self.url("/auth/change-password"))
            .bearer_auth(token)
            .json(&json!({ "currentPassword": current, "newPassword": new }));
        self.send(request).await?;
        Ok(())
    }

    async fn fetch_active_trip(&self, token: &str) -> Result<Option<RemoteTrip>, RemoteError> {
        let request = self
            .client
            .get(self.url("/trips/active"))
            .bearer_auth(token);

        match self.send(request).await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => Ok(None),
            Ok(response) => response
                .json::<Option<RemoteTrip>>()
                .await
                .map_err(|err| RemoteError::Malformed(err.to_string())),
            Err(RemoteError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn transition(
        &self,
        token: &str,
        trip_id: &str,
        action: TripAction,
        completion: Option<&CompletionPayload>,
    ) -> Result<RemoteTrip, RemoteError> {
        let mut request = self
            .client
            .post(self.url(&format!("/trips/{trip_id}/{action}")))
            .bearer_auth(token);
        if let Some(payload) = completion {
            request = request.json(payload);
        }
        self.send_json(request).await
    }

    async fn inspect_files(&self, files: &[FileCandidate]) -> Result<(), LifecycleError> {
        let mut errors = Vec::new();
        for file in files {
            let problems = match self.resolve_capture(&file.uri).await {
                Ok((_, len)) => validate_captured_size(file, len),
                Err(problem) => vec![problem],
            };
            errors.extend(problems.into_iter().map(|problem| format!("{}: {problem}", file.name)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::InvalidFiles(errors))
        }
    }

    async fn upload_documents(
        &self,
        token: &str,
        trip_id: &str,
        stage: DocumentStage,
        documents: &[Document],
        remarks: Option<&str>,
    ) -> Result<UploadResponse, RemoteError> {
        let mut form = Form::new().text("remarks", remarks.unwrap_or_default().to_string());
        for document in documents {
            form = form.part(stage.upload_field(), self.file_part(document).await?);
        }

        let request = self
            .client
            .post(self.url(&format!("/trips/{trip_id}/documents/{stage}")))
            .bearer_auth(token)
            .multipart(form);
        self.send_json(request).await
    }

    async fn trip_history(
        &self,
        token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<RemoteTrip>, RemoteError> {
        let request = self
            .client
            .get(self.url("/trips/history"))
            .bearer_auth(token)
            .query(&[
                ("page", page.to_string()),
                ("limit", limit.to_string()),
                ("status", "completed".to_string()),
            ]);
        self.send_json(request).await
    }
}
