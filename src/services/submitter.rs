use std::sync::Arc;

use crate::error::JobError;
use crate::models::job::{Job, JobKind};
use crate::services::transport::{Backend, UploadRequest};

/// Turns a photo into a backend job.
#[derive(Clone)]
pub struct JobSubmitter {
    backend: Arc<dyn Backend>,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Upload `image` for `kind`. The returned job is pending, or already
    /// completed when the backend generated the result synchronously.
    pub async fn submit(&self, kind: JobKind, image: Vec<u8>) -> Result<Job, JobError> {
        tracing::debug!(kind = %kind, bytes = image.len(), "Uploading photo");

        let receipt = self
            .backend
            .upload(UploadRequest::for_kind(kind, image))
            .await
            .map_err(|e| {
                tracing::warn!(kind = %kind, error = %e, "Upload failed");
                if e.is_network() {
                    JobError::Transport(e)
                } else {
                    JobError::UploadRejected(e)
                }
            })?;

        let job = Job::from_receipt(kind, receipt);

        metrics::counter!("petecho_jobs_submitted_total", "kind" => kind_label(kind)).increment(1);

        tracing::info!(
            job_id = job.id,
            kind = %kind,
            status = %job.status,
            "Photo uploaded"
        );

        Ok(job)
    }
}

pub(crate) fn kind_label(kind: JobKind) -> &'static str {
    match kind {
        JobKind::PetPhoto => "pet_photo",
        JobKind::MemoryPhoto { .. } => "memory_photo",
    }
}
