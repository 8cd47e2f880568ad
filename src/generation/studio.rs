use crate::{
    cloudinary::ImageHost,
    error::Result,
    generation::ModelLoader,
    models::{GeneratedImage, GenerationOutcome, GenerationParams, ModelInfo, Prompt},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Local file holding one request's image. Removed when dropped.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(work_dir: &Path, request_id: &str) -> Self {
        Self {
            path: work_dir.join(format!("generated_image_{}.png", request_id)),
        }
    }

    pub fn write(work_dir: &Path, request_id: &str, image: &GeneratedImage) -> Result<Self> {
        let scratch = Self::new(work_dir, request_id);
        image.save(&scratch.path)?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// Runs prompt -> image -> upload, one request at a time.
pub struct Studio {
    loader: Arc<ModelLoader>,
    host: Arc<dyn ImageHost>,
    params: GenerationParams,
    work_dir: PathBuf,
    turn: Mutex<()>,
}

impl Studio {
    pub fn new(
        loader: Arc<ModelLoader>,
        host: Arc<dyn ImageHost>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let params = GenerationParams::from(loader.config());
        Self {
            loader,
            host,
            params,
            work_dir: work_dir.into(),
            turn: Mutex::new(()),
        }
    }

    pub fn host_name(&self) -> &str {
        self.host.name()
    }

    /// Model details, loading the model if nobody has yet.
    pub async fn model_info(&self) -> Result<ModelInfo> {
        Ok(self.loader.get_or_load().await?.info().clone())
    }

    /// Generates one image for `prompt` and uploads it.
    ///
    /// Model and I/O errors are returned as `Err`. An upload that yields no URL
    /// is not an error: it is reported in `GenerationOutcome::upload`.
    pub async fn generate(&self, prompt: &Prompt) -> Result<GenerationOutcome> {
        let _turn = self.turn.lock().await;
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let model = self.loader.get_or_load().await?;
        log::info!("🎨 [{}] Generating: {}", request_id, prompt);

        let image = {
            let _timer = crate::logger::timer("generation");
            model.generate(prompt, &self.params).await?
        };

        let scratch = ScratchFile::write(&self.work_dir, &request_id, &image)?;
        log::info!(
            "💾 [{}] Saved {}x{} image to {}",
            request_id,
            image.width,
            image.height,
            scratch.path().display()
        );

        let upload = self.host.upload(scratch.path()).await;
        drop(scratch);

        match &upload {
            Ok(uploaded) => log::info!("🔗 [{}] Hosted at {}", request_id, uploaded.secure_url),
            Err(failure) => log::warn!("[{}] No URL for this request: {}", request_id, failure),
        }

        Ok(GenerationOutcome {
            request_id,
            prompt: prompt.to_string(),
            model: image.model,
            elapsed: started.elapsed(),
            upload,
        })
    }
}
