use crate::error::UploadFailure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of pushing one file to the media host. The `Err` side is the
/// absence marker: no URL, with the reason it is missing.
pub type UploadResult = std::result::Result<UploadedImage, UploadFailure>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedImage {
    pub public_id: String,
    pub secure_url: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: Option<u64>,
    /// `f_auto,q_auto` delivery variant.
    pub optimized_url: String,
    /// 500x500 auto-cropped delivery variant.
    pub thumbnail_url: String,
}

/// Subset of Cloudinary's upload response that this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryUploadResponse {
    pub public_id: String,
    pub secure_url: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryErrorBody {
    pub error: CloudinaryErrorMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryErrorMessage {
    pub message: String,
}

/// Everything a page needs to render one request's result.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub request_id: String,
    pub prompt: String,
    pub model: String,
    pub elapsed: Duration,
    pub upload: UploadResult,
}

impl GenerationOutcome {
    pub fn image_url(&self) -> Option<&str> {
        self.upload.as_ref().ok().map(|img| img.secure_url.as_str())
    }
}
