//! Test helpers: a scripted in-process backend and a real HTTP stub server

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use petecho_client::app_state::AppState;
use petecho_client::models::event::JobEvent;
use petecho_client::models::job::{HealthReport, StatusReport, UploadReceipt};
use petecho_client::orchestrator::{JobHandle, JobOrchestrator};
use petecho_client::services::poller::PollPolicy;
use petecho_client::services::transport::{Backend, TransportError, UploadRequest};

use crate::fixtures;

pub const PET_JOB_ID: i64 = 1;

pub fn memory_job_id(slot: u8) -> i64 {
    10 + i64::from(slot)
}

type StatusScript = dyn Fn(i64, u32) -> Result<StatusReport, TransportError> + Send + Sync;

/// In-process [`Backend`] whose status answers follow a script of
/// `(job_id, attempt) -> report`. Every call is recorded.
pub struct StubBackend {
    script: Box<StatusScript>,
    immediate_url: Option<String>,
    reject_uploads: bool,
    download: Option<Vec<u8>>,
    uploads: Mutex<Vec<UploadRequest>>,
    status_calls: Mutex<HashMap<i64, u32>>,
    downloads: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new(
        script: impl Fn(i64, u32) -> Result<StatusReport, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            immediate_url: None,
            reject_uploads: false,
            download: Some(fixtures::png_bytes(4, 3)),
            uploads: Mutex::new(Vec::new()),
            status_calls: Mutex::new(HashMap::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Same per-attempt script for every job.
    pub fn scripted(
        script: impl Fn(u32) -> Result<StatusReport, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |_, attempt| script(attempt))
    }

    pub fn never_finishing() -> Self {
        Self::scripted(|_| fixtures::processing())
    }

    pub fn completing_at(attempt: u32) -> Self {
        Self::scripted(move |n| {
            if n >= attempt {
                fixtures::completed(fixtures::RESULT_URL)
            } else {
                fixtures::pending()
            }
        })
    }

    pub fn with_immediate_result(mut self, url: &str) -> Self {
        self.immediate_url = Some(url.to_string());
        self
    }

    pub fn rejecting_uploads(mut self) -> Self {
        self.reject_uploads = true;
        self
    }

    pub fn with_download(mut self, bytes: Vec<u8>) -> Self {
        self.download = Some(bytes);
        self
    }

    pub fn without_download(mut self) -> Self {
        self.download = None;
        self
    }

    pub fn total_status_calls(&self) -> u32 {
        self.status_calls.lock().unwrap().values().sum()
    }

    pub fn status_calls(&self, job_id: i64) -> u32 {
        self.status_calls
            .lock()
            .unwrap()
            .get(&job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().unwrap().clone()
    }
}

fn image_id_for(request: &UploadRequest) -> i64 {
    request
        .fields
        .iter()
        .find(|(name, _)| *name == "photo_index")
        .and_then(|(_, value)| value.parse::<u8>().ok())
        .map(memory_job_id)
        .unwrap_or(PET_JOB_ID)
}

#[async_trait]
impl Backend for StubBackend {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, TransportError> {
        let image_id = image_id_for(&request);
        self.uploads.lock().unwrap().push(request);

        if self.reject_uploads {
            return Err(TransportError::Status {
                status: 500,
                body: "upload failed".to_string(),
            });
        }

        Ok(UploadReceipt {
            image_id,
            generated_image_url: self.immediate_url.clone(),
        })
    }

    async fn get_status(&self, job_id: i64) -> Result<StatusReport, TransportError> {
        let attempt = {
            let mut calls = self.status_calls.lock().unwrap();
            let count = calls.entry(job_id).or_insert(0);
            *count += 1;
            *count
        };
        (self.script)(job_id, attempt)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.downloads.lock().unwrap().push(url.to_string());
        self.download.clone().ok_or(TransportError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            message: None,
            version: None,
        })
    }

    async fn studio_background(&self) -> Result<Vec<u8>, TransportError> {
        Ok(fixtures::png_bytes(2, 2))
    }
}

pub fn orchestrator_for(backend: Arc<StubBackend>) -> JobOrchestrator {
    JobOrchestrator::new(AppState::new(backend, PollPolicy::default()))
}

pub async fn collect_events(mut handle: JobHandle) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    events
}

pub fn status_texts(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            JobEvent::Status { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// One multipart upload as the HTTP stub saw it.
#[derive(Debug, Clone, Default)]
pub struct RecordedUpload {
    pub path: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub image_len: usize,
    pub fields: HashMap<String, String>,
}

/// Shared state of the HTTP stub. Queued responses are served in order;
/// once a queue is empty its default is served.
#[derive(Default)]
pub struct HttpStub {
    pub upload_responses: Mutex<VecDeque<(StatusCode, String)>>,
    pub status_responses: Mutex<VecDeque<(StatusCode, String)>>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub status_hits: AtomicU32,
    pub image: Mutex<Option<Vec<u8>>>,
}

impl HttpStub {
    pub fn queue_upload(&self, status: StatusCode, body: impl Into<String>) {
        self.upload_responses
            .lock()
            .unwrap()
            .push_back((status, body.into()));
    }

    pub fn queue_status(&self, status: StatusCode, body: impl Into<String>) {
        self.status_responses
            .lock()
            .unwrap()
            .push_back((status, body.into()));
    }

    pub fn set_image(&self, bytes: Vec<u8>) {
        *self.image.lock().unwrap() = Some(bytes);
    }

    pub fn status_hits(&self) -> u32 {
        self.status_hits.load(Ordering::SeqCst)
    }

    pub fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

async fn handle_upload(stub: &HttpStub, path: &str, mut multipart: Multipart) -> (StatusCode, String) {
    let mut recorded = RecordedUpload {
        path: path.to_string(),
        ..RecordedUpload::default()
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            recorded.file_name = field.file_name().map(str::to_string);
            recorded.content_type = field.content_type().map(str::to_string);
            recorded.image_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else {
            let value = field.text().await.unwrap_or_default();
            recorded.fields.insert(name, value);
        }
    }

    stub.uploads.lock().unwrap().push(recorded);
    stub.upload_responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::OK, r#"{"image_id": 1}"#.to_string()))
}

async fn upload_pet(State(stub): State<Arc<HttpStub>>, multipart: Multipart) -> (StatusCode, String) {
    handle_upload(&stub, "/upload", multipart).await
}

async fn upload_memory(
    State(stub): State<Arc<HttpStub>>,
    multipart: Multipart,
) -> (StatusCode, String) {
    handle_upload(&stub, "/upload-memory-photo", multipart).await
}

async fn status(State(stub): State<Arc<HttpStub>>, Path(_id): Path<i64>) -> (StatusCode, String) {
    stub.status_hits.fetch_add(1, Ordering::SeqCst);
    stub.status_responses.lock().unwrap().pop_front().unwrap_or((
        StatusCode::OK,
        r#"{"status": "processing", "has_generated_image": false}"#.to_string(),
    ))
}

fn image_response(stub: &HttpStub) -> Response {
    match stub.image.lock().unwrap().clone() {
        Some(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        None => (StatusCode::NOT_FOUND, r#"{"error": "not found"}"#).into_response(),
    }
}

async fn image(State(stub): State<Arc<HttpStub>>, Path(_id): Path<i64>) -> Response {
    image_response(&stub)
}

async fn studio_background(State(stub): State<Arc<HttpStub>>) -> Response {
    image_response(&stub)
}

async fn health() -> (StatusCode, String) {
    (
        StatusCode::OK,
        r#"{"status": "healthy", "message": "ok", "version": "2.0.0"}"#.to_string(),
    )
}

/// Serve `stub` on an ephemeral local port and return its base URL.
pub async fn spawn_http_stub(stub: Arc<HttpStub>) -> String {
    let app = Router::new()
        .route("/upload", post(upload_pet))
        .route("/upload-memory-photo", post(upload_memory))
        .route("/status/{id}", get(status))
        .route("/image/{id}", get(image))
        .route("/studio-background", get(studio_background))
        .route("/health", get(health))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("stub address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub backend");
    });

    format!("http://{addr}")
}
