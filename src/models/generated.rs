use crate::error::{GenError, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Knobs passed to the model for a single generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub steps: usize,
    pub guidance_scale: f64,
    pub seed: Option<u64>,
}

impl From<&crate::config::ModelConfig> for GenerationParams {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            steps: config.steps,
            guidance_scale: config.guidance_scale,
            seed: config.seed,
        }
    }
}

/// One image produced by the model, held in memory as PNG.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub prompt: String,
    pub model: String,
    pub seed: Option<u64>,
}

impl GeneratedImage {
    /// Builds from raw interleaved RGB8 pixels.
    pub fn from_rgb(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let buffer = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            GenError::Image(format!(
                "pixel buffer does not match {}x{} RGB dimensions",
                width, height
            ))
        })?;

        Ok(Self {
            png: encode_png(&DynamicImage::ImageRgb8(buffer))?,
            width,
            height,
            prompt: prompt.into(),
            model: model.into(),
            seed: None,
        })
    }

    /// Builds from any encoded image the `image` crate can decode, re-encoding as PNG.
    pub fn from_encoded(
        bytes: &[u8],
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;

        Ok(Self {
            png: encode_png(&decoded)?,
            width: decoded.width(),
            height: decoded.height(),
            prompt: prompt.into(),
            model: model.into(),
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
