//! Prompt in, hosted image out.
//!
//! A text prompt is turned into one image by a pretrained diffusion model
//! ([`generation`]), the image is pushed to Cloudinary ([`cloudinary`]) and the
//! resulting URL is rendered on a single page ([`server`], behind the `server`
//! feature).

pub mod cloudinary;
pub mod config;
pub mod error;
pub mod generation;
pub mod logger;
pub mod models;
#[cfg(feature = "server")]
pub mod server;

pub use cloudinary::{CloudinaryClient, ImageHost};
pub use config::{CloudinaryConfig, Config, ModelBackend, ModelConfig, ServerConfig};
pub use error::{GenError, Result, UploadFailure};
pub use generation::{ImageModel, ModelHandle, ModelLoader, Studio};
pub use models::{
    Device, GeneratedImage, GenerationOutcome, GenerationParams, ModelInfo, Precision, Prompt,
    UploadResult, UploadedImage,
};
