use std::sync::Arc;

use crate::error::JobError;
use crate::models::event::GeneratedImage;
use crate::models::job::Job;
use crate::services::transport::Backend;

/// Downloads and decodes generated images.
#[derive(Clone)]
pub struct ResultLoader {
    backend: Arc<dyn Backend>,
}

impl ResultLoader {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Fetch the result of a completed job.
    pub async fn load(&self, job: &Job) -> Result<GeneratedImage, JobError> {
        let url = job
            .result_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(JobError::MissingResultUrl { job_id: job.id })?;

        let bytes = self
            .backend
            .download(url)
            .await
            .map_err(|source| JobError::ResultUnavailable {
                job_id: job.id,
                source,
            })?;

        let image = GeneratedImage::decode(bytes, url)?;

        tracing::info!(
            job_id = job.id,
            format = ?image.format,
            width = image.width,
            height = image.height,
            "Result image loaded"
        );

        Ok(image)
    }

    /// Fetch the studio backdrop used behind the memorial photo.
    pub async fn load_studio_background(&self) -> Result<GeneratedImage, JobError> {
        let bytes = self
            .backend
            .studio_background()
            .await
            .map_err(JobError::BackgroundUnavailable)?;

        Ok(GeneratedImage::decode(bytes, "/studio-background")?)
    }
}
