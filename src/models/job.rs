use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of independent memory-photo slots offered by the app.
pub const MEMORY_SLOT_COUNT: u8 = 4;

/// Status of an image generation job as reported by the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Map a backend status string, falling back to `Unknown` for anything unrecognised.
    pub fn from_backend(raw: &str) -> Self {
        Self::from_str(raw).unwrap_or(Self::Unknown)
    }
}

/// One of the four memory-photo positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MemorySlot(u8);

impl MemorySlot {
    pub fn new(index: u8) -> Result<Self, InvalidSlot> {
        if index < MEMORY_SLOT_COUNT {
            Ok(Self(index))
        } else {
            Err(InvalidSlot(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = MemorySlot> {
        (0..MEMORY_SLOT_COUNT).map(MemorySlot)
    }
}

impl TryFrom<u8> for MemorySlot {
    type Error = InvalidSlot;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<MemorySlot> for u8 {
    fn from(slot: MemorySlot) -> Self {
        slot.0
    }
}

impl fmt::Display for MemorySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memory photo slot {0} is out of range (0-{max})", max = MEMORY_SLOT_COUNT - 1)]
pub struct InvalidSlot(pub u8);

/// What a job is generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// The memorial portrait generated from the primary pet photo.
    PetPhoto,
    /// A stylized memory photo at one of the four slots.
    MemoryPhoto { slot: MemorySlot },
}

impl JobKind {
    /// Backend path that accepts uploads for this kind.
    pub fn upload_path(&self) -> &'static str {
        match self {
            JobKind::PetPhoto => "/upload",
            JobKind::MemoryPhoto { .. } => "/upload-memory-photo",
        }
    }

    /// File name sent with the multipart image part.
    pub fn upload_file_name(&self) -> String {
        match self {
            JobKind::PetPhoto => "pet.jpg".to_string(),
            JobKind::MemoryPhoto { slot } => format!("memory_{slot}.jpg"),
        }
    }

    /// Extra text fields sent alongside the image.
    pub fn upload_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            JobKind::PetPhoto => Vec::new(),
            JobKind::MemoryPhoto { slot } => vec![("photo_index", slot.to_string())],
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::PetPhoto => f.write_str("pet_photo"),
            JobKind::MemoryPhoto { slot } => write!(f, "memory_photo[{slot}]"),
        }
    }
}

/// A backend-side image processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    /// Build a job from an upload acknowledgement. A receipt that already
    /// carries a result URL yields a completed job.
    pub fn from_receipt(kind: JobKind, receipt: UploadReceipt) -> Self {
        let result_url = receipt.generated_image_url.filter(|url| !url.is_empty());
        let status = if result_url.is_some() {
            JobStatus::Completed
        } else {
            JobStatus::Pending
        };

        Self {
            id: receipt.image_id,
            kind,
            status,
            result_url,
            submitted_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed && self.result_url.is_some()
    }

    /// Fold one status report into the job. A `completed` report without an
    /// attached image is held at `processing`.
    pub fn apply(&mut self, report: &StatusReport) {
        self.status = match report.completed_url() {
            Some(url) => {
                self.result_url = Some(url.to_string());
                JobStatus::Completed
            }
            None if report.status == JobStatus::Completed => JobStatus::Processing,
            None => report.status,
        };
    }
}

/// Parsed acknowledgement of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub image_id: i64,
    #[serde(default)]
    pub generated_image_url: Option<String>,
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub has_result: bool,
    pub result_url: Option<String>,
}

impl StatusReport {
    /// The result URL, but only when the report is a finished job with an image attached.
    pub fn completed_url(&self) -> Option<&str> {
        if self.status != JobStatus::Completed || !self.has_result {
            return None;
        }
        self.result_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Backend health summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
