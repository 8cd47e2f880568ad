//! In-memory stand-ins for the model and the media host.

use crate::{
    cloudinary::ImageHost,
    error::{GenError, Result, UploadFailure},
    generation::ImageModel,
    models::{
        Device, GeneratedImage, GenerationParams, ModelInfo, Precision, Prompt, UploadResult,
        UploadedImage,
    },
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const FAKE_URL: &str =
    "https://res.cloudinary.com/demo/image/upload/v1/generated_image.png";
const DELIVERY_BASE: &str = "https://res.cloudinary.com/demo/image/upload";

pub struct FakeModel {
    info: ModelInfo,
    fail: bool,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                id: "fake/diffusion".to_string(),
                backend: "fake".to_string(),
                device: Device::Cpu,
                precision: Precision::F32,
            },
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageModel for FakeModel {
    async fn generate(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(GenError::Generation("CUDA out of memory".into()));
        }
        GeneratedImage::from_rgb(vec![200u8; 2 * 2 * 3], 2, 2, prompt.as_str(), &self.info.id)
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

/// Records what it was asked to upload and whether the file was there.
pub struct FakeHost {
    fail: bool,
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, path: &Path) -> UploadResult {
        let present = std::fs::read(path)
            .map(|bytes| bytes.starts_with(b"\x89PNG"))
            .unwrap_or(false);
        self.seen.lock().unwrap().push((path.to_path_buf(), present));

        if self.fail {
            return Err(UploadFailure::Transport("connection reset by peer".into()));
        }
        Ok(UploadedImage {
            public_id: "generated_image".to_string(),
            secure_url: FAKE_URL.to_string(),
            format: Some("png".to_string()),
            width: Some(2),
            height: Some(2),
            bytes: Some(64),
            optimized_url: format!("{}/f_auto,q_auto/generated_image", DELIVERY_BASE),
            thumbnail_url: format!("{}/c_auto,g_auto,h_500,w_500/generated_image", DELIVERY_BASE),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}
