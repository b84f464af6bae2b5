//! Test fixtures: encoded images and canned status reports

use image::{ImageFormat, Rgb, RgbImage};
use petecho_client::models::job::{JobStatus, StatusReport};
use petecho_client::services::transport::TransportError;
use std::io::Cursor;

pub const RESULT_URL: &str = "http://x/y.jpg";

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 140, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encode fixture image");
    out.into_inner()
}

/// A small valid JPEG, standing in for a camera photo.
pub fn jpeg_bytes() -> Vec<u8> {
    encode(8, 6, ImageFormat::Jpeg)
}

/// A small valid PNG, standing in for a generated result.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn report(status: JobStatus) -> Result<StatusReport, TransportError> {
    Ok(StatusReport {
        status,
        has_result: false,
        result_url: None,
    })
}

pub fn pending() -> Result<StatusReport, TransportError> {
    report(JobStatus::Pending)
}

pub fn processing() -> Result<StatusReport, TransportError> {
    report(JobStatus::Processing)
}

pub fn failed() -> Result<StatusReport, TransportError> {
    report(JobStatus::Failed)
}

pub fn completed(url: &str) -> Result<StatusReport, TransportError> {
    Ok(StatusReport {
        status: JobStatus::Completed,
        has_result: true,
        result_url: Some(url.to_string()),
    })
}

/// What the transport reports for an HTTP 500 or an unreadable body.
pub fn miss() -> Result<StatusReport, TransportError> {
    Err(TransportError::Status {
        status: 500,
        body: "internal error".to_string(),
    })
}
