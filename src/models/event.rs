use image::ImageFormat;

use crate::error::JobError;

/// A generated image that has been downloaded and successfully decoded.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub source_url: String,
}

impl GeneratedImage {
    /// Decode `bytes`, keeping the original encoding alongside the detected metadata.
    pub fn decode(bytes: Vec<u8>, source_url: impl Into<String>) -> Result<Self, image::ImageError> {
        let format = image::guess_format(&bytes)?;
        let decoded = image::load_from_memory_with_format(&bytes, format)?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            format,
            bytes,
            source_url: source_url.into(),
        })
    }

    /// File extension matching the detected format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Everything a running job reports back to the caller.
#[derive(Debug)]
pub enum JobEvent {
    /// Human-readable progress text (memorial photo pipeline).
    Status { text: String },
    /// Busy indicator (memory photo pipeline).
    Processing { active: bool },
    /// Terminal result. Always the last event of a job.
    Finished(Result<GeneratedImage, JobError>),
}

impl JobEvent {
    pub fn status(text: impl Into<String>) -> Self {
        JobEvent::Status { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Finished(_))
    }
}
