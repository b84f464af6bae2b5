use crate::services::transport::TransportError;

/// Terminal failure of a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The upload never reached the backend (DNS, TLS, timeout, reset).
    #[error("upload failed: {0}")]
    Transport(#[source] TransportError),

    /// The backend answered the upload but did not accept it.
    #[error("upload rejected by backend: {0}")]
    UploadRejected(#[source] TransportError),

    /// The backend reported `status = failed`.
    #[error("job {job_id} failed on the backend")]
    JobFailed { job_id: i64 },

    /// No terminal status within the polling budget.
    #[error("job {job_id} timed out after {attempts} status checks")]
    JobTimedOut { job_id: i64, attempts: u32 },

    /// The result image could not be downloaded.
    #[error("failed to download result for job {job_id}: {source}")]
    ResultUnavailable {
        job_id: i64,
        #[source]
        source: TransportError,
    },

    /// The downloaded bytes are not a decodable image.
    #[error("failed to decode result image: {0}")]
    Decode(#[from] image::ImageError),

    /// A job was handed to the loader without a result URL.
    #[error("job {job_id} has no result URL")]
    MissingResultUrl { job_id: i64 },

    /// The studio backdrop could not be downloaded.
    #[error("failed to download studio background: {0}")]
    BackgroundUnavailable(#[source] TransportError),
}

impl JobError {
    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            JobError::Transport(_) | JobError::UploadRejected(_) => {
                "Upload failed, please check your network connection"
            }
            JobError::JobFailed { .. } => "Generation failed, please try again",
            JobError::JobTimedOut { .. } => "Generation timed out, please try again",
            JobError::ResultUnavailable { .. }
            | JobError::Decode(_)
            | JobError::MissingResultUrl { .. } => "Failed to load the generated image",
            JobError::BackgroundUnavailable(_) => "Failed to load the studio background",
        }
    }

    /// Label value used for the failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            JobError::Transport(_) => "transport",
            JobError::UploadRejected(_) => "upload_rejected",
            JobError::JobFailed { .. } => "failed",
            JobError::JobTimedOut { .. } => "timed_out",
            JobError::ResultUnavailable { .. } => "download",
            JobError::Decode(_) => "decode",
            JobError::MissingResultUrl { .. } => "missing_result_url",
            JobError::BackgroundUnavailable(_) => "background",
        }
    }
}
