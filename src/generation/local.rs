//! Stable Diffusion v1.5 running in-process on candle.

use crate::{
    config::ModelConfig,
    error::{GenError, Result},
    generation::ImageModel,
    models::{Device, GeneratedImage, GenerationParams, ModelInfo, Precision, Prompt},
};
use async_trait::async_trait;
use candle_core::{DType, Device as CandleDevice, IndexOp, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, clip::ClipTextTransformer, schedulers::Scheduler, unet_2d::UNet2DConditionModel,
    vae::AutoEncoderKL, StableDiffusionConfig,
};
use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;

const TOKENIZER_REPO: &str = "openai/clip-vit-base-patch32";
const VAE_SCALE: f64 = 0.18215;
const LATENT_CHANNELS: usize = 4;

struct Pipeline {
    model_id: String,
    device: CandleDevice,
    dtype: DType,
    sd_config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    pad_id: u32,
    clip: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
}

/// Diffusion pipeline whose weights stay resident for the process lifetime.
pub struct LocalDiffusionModel {
    pipeline: Arc<Pipeline>,
    info: ModelInfo,
}

impl LocalDiffusionModel {
    /// Downloads (or reuses cached) weights and builds every sub-model.
    /// Blocking; call from a blocking-capable thread.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let device = if config.force_cpu {
            CandleDevice::Cpu
        } else {
            CandleDevice::cuda_if_available(0).map_err(load_failed)?
        };

        // Half precision on an accelerator; CPU kernels want f32.
        let (dtype, precision) = if device.is_cuda() {
            (DType::F16, Precision::F16)
        } else {
            (DType::F32, Precision::F32)
        };
        let reported_device = if device.is_cuda() {
            Device::Cuda
        } else {
            Device::Cpu
        };

        let api = ApiBuilder::new()
            .with_token(config.hf_token.clone())
            .build()
            .map_err(|e| GenError::ModelLoad(e.to_string()))?;

        let sd_config = StableDiffusionConfig::v1_5(
            None,
            Some(config.height as usize),
            Some(config.width as usize),
        );

        log::info!("🔤 Loading CLIP tokenizer from {}", TOKENIZER_REPO);
        let tokenizer_path = api
            .model(TOKENIZER_REPO.to_string())
            .get("tokenizer.json")
            .map_err(|e| GenError::ModelLoad(e.to_string()))?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| GenError::ModelLoad(e.to_string()))?;

        let pad_token = sd_config
            .clip
            .pad_with
            .clone()
            .unwrap_or_else(|| "<|endoftext|>".to_string());
        let pad_id = *tokenizer
            .get_vocab(true)
            .get(pad_token.as_str())
            .ok_or_else(|| GenError::ModelLoad(format!("pad token {} missing", pad_token)))?;

        let weights = |stem: &str| fetch_weights(&api, &config.model_id, stem, dtype);
        let files = WeightFiles {
            clip: weights("text_encoder/model")?,
            unet: weights("unet/diffusion_pytorch_model")?,
            vae: weights("vae/diffusion_pytorch_model")?,
        };
        let (clip, unet, vae) = build_models(&sd_config, &files, &device, dtype)?;

        Ok(Self {
            info: ModelInfo {
                id: config.model_id.clone(),
                backend: config.backend.as_str().to_string(),
                device: reported_device,
                precision,
            },
            pipeline: Arc::new(Pipeline {
                model_id: config.model_id.clone(),
                device,
                dtype,
                sd_config,
                tokenizer,
                pad_id,
                clip,
                unet,
                vae,
            }),
        })
    }
}

struct WeightFiles {
    clip: PathBuf,
    unet: PathBuf,
    vae: PathBuf,
}

fn load_failed(err: candle_core::Error) -> GenError {
    GenError::ModelLoad(err.to_string())
}

fn build_models(
    sd_config: &StableDiffusionConfig,
    files: &WeightFiles,
    device: &CandleDevice,
    dtype: DType,
) -> Result<(ClipTextTransformer, UNet2DConditionModel, AutoEncoderKL)> {
    log::info!("📝 Loading text encoder");
    let clip =
        stable_diffusion::build_clip_transformer(&sd_config.clip, &files.clip, device, dtype)
            .map_err(load_failed)?;

    log::info!("🧩 Loading UNet");
    let unet = sd_config
        .build_unet(&files.unet, device, LATENT_CHANNELS, false, dtype)
        .map_err(load_failed)?;

    log::info!("🖼️  Loading VAE");
    let vae = sd_config
        .build_vae(&files.vae, device, dtype)
        .map_err(load_failed)?;

    Ok((clip, unet, vae))
}

/// Prefers the `.fp16` weight file when running in half precision.
fn fetch_weights(api: &Api, repo: &str, stem: &str, dtype: DType) -> Result<PathBuf> {
    let repo = api.model(repo.to_string());
    if dtype == DType::F16 {
        match repo.get(&format!("{}.fp16.safetensors", stem)) {
            Ok(path) => return Ok(path),
            Err(e) => log::warn!("fp16 weights for {} unavailable ({}), using fp32", stem, e),
        }
    }
    repo.get(&format!("{}.safetensors", stem))
        .map_err(|e| GenError::ModelLoad(e.to_string()))
}

impl Pipeline {
    fn embed(&self, text: &str) -> Result<Tensor> {
        let mut tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| GenError::Generation(e.to_string()))?
            .get_ids()
            .to_vec();

        let max_len = self.sd_config.clip.max_position_embeddings;
        tokens.truncate(max_len);
        tokens.resize(max_len, self.pad_id);

        let tokens = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        Ok(self.clip.forward(&tokens)?)
    }

    fn run(&self, prompt: &str, params: &GenerationParams) -> Result<GeneratedImage> {
        if params.width % 8 != 0 || params.height % 8 != 0 {
            return Err(GenError::Generation(
                "width and height must be multiples of 8".into(),
            ));
        }

        let seed = params.seed.unwrap_or_else(rand::random);
        self.device.set_seed(seed)?;

        let guided = params.guidance_scale > 1.0;
        let text_embeddings = self.embed(prompt)?;
        let text_embeddings = if guided {
            Tensor::cat(&[self.embed("")?, text_embeddings], 0)?
        } else {
            text_embeddings
        }
        .to_dtype(self.dtype)?;

        let mut scheduler = self.sd_config.build_scheduler(params.steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let latent_shape = (
            1,
            LATENT_CHANNELS,
            params.height as usize / 8,
            params.width as usize / 8,
        );
        let mut latents = (Tensor::randn(0f32, 1f32, latent_shape, &self.device)?
            * scheduler.init_noise_sigma())?
        .to_dtype(self.dtype)?;

        for (step, &timestep) in timesteps.iter().enumerate() {
            log::debug!("Diffusion step {}/{}", step + 1, timesteps.len());

            let input = if guided {
                Tensor::cat(&[&latents, &latents], 0)?
            } else {
                latents.clone()
            };
            let input = scheduler.scale_model_input(input, timestep)?;
            let noise = self.unet.forward(&input, timestep as f64, &text_embeddings)?;

            let noise = if guided {
                let chunks = noise.chunk(2, 0)?;
                let (uncond, text) = (&chunks[0], &chunks[1]);
                (uncond + ((text - uncond)? * params.guidance_scale)?)?
            } else {
                noise
            };

            latents = scheduler.step(&noise, timestep, &latents)?;
        }

        let decoded = self.vae.decode(&(&latents / VAE_SCALE)?)?;
        let decoded = ((decoded / 2.)? + 0.5)?.to_device(&CandleDevice::Cpu)?;
        let decoded = (decoded.clamp(0f32, 1.)? * 255.)?.to_dtype(DType::U8)?;

        let (_, _, height, width) = decoded.dims4()?;
        let pixels: Vec<u8> = decoded
            .i(0)?
            .permute((1, 2, 0))?
            .flatten_all()?
            .to_vec1::<u8>()?;

        Ok(
            GeneratedImage::from_rgb(pixels, width as u32, height as u32, prompt, &self.model_id)?
                .with_seed(seed),
        )
    }
}

#[async_trait]
impl ImageModel for LocalDiffusionModel {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<GeneratedImage> {
        let pipeline = Arc::clone(&self.pipeline);
        let prompt = prompt.as_str().to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || pipeline.run(&prompt, &params))
            .await
            .map_err(|e| GenError::Generation(e.to_string()))?
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_weights_are_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = WeightFiles {
            clip: dir.path().join("text_encoder.safetensors"),
            unet: dir.path().join("unet.safetensors"),
            vae: dir.path().join("vae.safetensors"),
        };
        let sd_config = StableDiffusionConfig::v1_5(None, Some(64), Some(64));

        let err = build_models(&sd_config, &files, &CandleDevice::Cpu, DType::F32)
            .err()
            .unwrap();
        assert!(matches!(err, GenError::ModelLoad(_)), "{err:?}");
    }

    #[test]
    fn test_candle_errors_at_load_time_map_to_model_load() {
        let err = load_failed(candle_core::Error::Msg("no cuda device".into()));
        assert!(matches!(err, GenError::ModelLoad(msg) if msg.contains("no cuda device")));
    }
}
