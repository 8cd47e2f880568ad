pub mod hosted;
#[cfg(feature = "local")]
pub mod local;
pub mod loader;
pub mod studio;
#[cfg(test)]
pub(crate) mod testing;

use crate::{
    error::Result,
    models::{GeneratedImage, GenerationParams, ModelInfo, Prompt},
};
use async_trait::async_trait;
use std::sync::Arc;

pub use hosted::HostedModel;
pub use loader::ModelLoader;
pub use studio::{ScratchFile, Studio};

/// A loaded text-to-image model, ready to turn a prompt into one image.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams)
        -> Result<GeneratedImage>;

    fn info(&self) -> &ModelInfo;
}

/// Process-wide shared model instance.
pub type ModelHandle = Arc<dyn ImageModel>;
