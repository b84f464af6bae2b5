//! HTTP transport to the image generation backend.
//!
//! [`Backend`] is the seam the submitter, poller and loader talk through;
//! [`HttpBackend`] is the production implementation on top of [`reqwest`].
//! Every call reports failure as a [`TransportError`] and never retries;
//! deciding whether a failure is transient is left to the caller.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::models::job::{HealthReport, JobKind, JobStatus, StatusReport, UploadReceipt};

/// Everything needed to upload one photo.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: &'static str,
    pub file_name: String,
    pub image: Vec<u8>,
    pub fields: Vec<(&'static str, String)>,
}

impl UploadRequest {
    pub fn for_kind(kind: JobKind, image: Vec<u8>) -> Self {
        Self {
            path: kind.upload_path(),
            file_name: kind.upload_file_name(),
            image,
            fields: kind.upload_fields(),
        }
    }
}

/// Operations the job pipeline needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Multipart upload of a photo. Returns the backend's job identifier.
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, TransportError>;

    /// Fetch the current status of a job.
    async fn get_status(&self, job_id: i64) -> Result<StatusReport, TransportError>;

    /// Fetch raw bytes from a result URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Backend liveness check.
    async fn health(&self) -> Result<HealthReport, TransportError>;

    /// Studio backdrop shown behind the memorial photo.
    async fn studio_background(&self) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest`-backed client for a single backend base URL.
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] (and its connection pool).
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute URLs pass through; backend-relative paths are joined to the base URL.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with('/') {
            self.endpoint(url)
        } else {
            url.to_string()
        }
    }

    async fn check_status(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn json_object(response: Response) -> Result<Map<String, Value>, TransportError> {
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        match serde_json::from_slice::<Value>(&body)? {
            Value::Object(map) => Ok(map),
            _ => Err(TransportError::NotAnObject),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.http.get(url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, TransportError> {
        let image_part = Part::bytes(request.image)
            .file_name(request.file_name)
            .mime_str("image/jpeg")?;

        let mut form = Form::new().part("image", image_part);
        for (name, value) in request.fields {
            form = form.text(name, value);
        }

        let response = self
            .http
            .post(self.endpoint(request.path))
            .multipart(form)
            .send()
            .await?;

        let body = Self::json_object(response).await?;
        parse_upload_receipt(&body)
    }

    async fn get_status(&self, job_id: i64) -> Result<StatusReport, TransportError> {
        let response = self
            .http
            .get(self.endpoint(&format!("/status/{job_id}")))
            .send()
            .await?;

        let body = Self::json_object(response).await?;
        Ok(parse_status_report(&body))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.fetch_bytes(&self.resolve(url)).await
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        let response = self.http.get(self.endpoint("/health")).send().await?;
        let body = Self::json_object(response).await?;
        Ok(serde_json::from_value(Value::Object(body))?)
    }

    async fn studio_background(&self) -> Result<Vec<u8>, TransportError> {
        self.fetch_bytes(&self.endpoint("/studio-background")).await
    }
}

fn parse_upload_receipt(body: &Map<String, Value>) -> Result<UploadReceipt, TransportError> {
    let image_id = body
        .get("image_id")
        .and_then(Value::as_i64)
        .ok_or(TransportError::MissingField("image_id"))?;

    Ok(UploadReceipt {
        image_id,
        generated_image_url: string_field(body, "generated_image_url"),
    })
}

/// Lenient status parsing: wrong or missing fields fall back to defaults.
fn parse_status_report(body: &Map<String, Value>) -> StatusReport {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    StatusReport {
        status: JobStatus::from_backend(status),
        has_result: body
            .get("has_generated_image")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        result_url: string_field(body, "generated_image_url"),
    }
}

fn string_field(body: &Map<String, Value>, name: &str) -> Option<String> {
    body.get(name).and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse backend response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("backend response is not a JSON object")]
    NotAnObject,

    #[error("backend response is missing `{0}`")]
    MissingField(&'static str),
}

impl TransportError {
    /// True when the failure happened before the backend produced a response.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Request(_))
    }
}
