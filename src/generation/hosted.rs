use crate::{
    config::ModelConfig,
    error::{GenError, Result},
    generation::ImageModel,
    models::{Device, GeneratedImage, GenerationParams, ModelInfo, Precision, Prompt},
};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

const TEXT_TO_IMAGE: &str = "text-to-image";

#[derive(Debug, Deserialize)]
struct HubModel {
    id: String,
    pipeline_tag: Option<String>,
}

/// Text-to-image model served by the Hugging Face inference API.
#[derive(Clone)]
pub struct HostedModel {
    client: Client,
    info: ModelInfo,
    inference_url: String,
    token: Option<String>,
}

impl HostedModel {
    /// Looks the model up on the hub and fails if it is missing or is not a
    /// text-to-image model.
    pub async fn resolve(config: &ModelConfig) -> Result<Self> {
        let client = Client::new();
        let metadata_url = format!("{}/api/models/{}", config.hub_endpoint, config.model_id);

        log::debug!("Resolving {} via {}", config.model_id, metadata_url);

        let response = authorized(client.get(&metadata_url), config.hf_token.as_deref())
            .send()
            .await
            .map_err(|e| GenError::ModelLoad(format!("hub unreachable: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(GenError::ModelLoad(format!(
                    "model '{}' not found on the hub",
                    config.model_id
                )))
            }
            status if !status.is_success() => {
                return Err(GenError::ModelLoad(format!(
                    "hub returned {} for '{}'",
                    status, config.model_id
                )))
            }
            _ => {}
        }

        let hub_model: HubModel = response
            .json()
            .await
            .map_err(|e| GenError::ModelLoad(format!("unreadable hub metadata: {}", e)))?;

        if let Some(tag) = hub_model.pipeline_tag.as_deref() {
            if tag != TEXT_TO_IMAGE {
                return Err(GenError::ModelLoad(format!(
                    "model '{}' is a {} model, not {}",
                    hub_model.id, tag, TEXT_TO_IMAGE
                )));
            }
        }

        Ok(Self {
            client,
            inference_url: format!("{}/models/{}", config.inference_endpoint, hub_model.id),
            info: ModelInfo {
                id: hub_model.id,
                backend: config.backend.as_str().to_string(),
                device: Device::Remote,
                precision: Precision::Remote,
            },
            token: config.hf_token.clone(),
        })
    }
}

#[async_trait]
impl ImageModel for HostedModel {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<GeneratedImage> {
        let mut parameters = json!({
            "width": params.width,
            "height": params.height,
            "num_inference_steps": params.steps,
            "guidance_scale": params.guidance_scale,
        });
        if let Some(seed) = params.seed {
            parameters["seed"] = json!(seed);
        }

        let payload = json!({
            "inputs": prompt.as_str(),
            "parameters": parameters,
        });

        log::info!("🖌️  Invoking {} on the inference API", self.info.id);

        let response = authorized(self.client.post(&self.inference_url), self.token.as_deref())
            .header(header::ACCEPT, "image/png")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::Generation(format!(
                "inference API returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        let image = GeneratedImage::from_encoded(&bytes, prompt.as_str(), &self.info.id)?;
        Ok(match params.seed {
            Some(seed) => image.with_seed(seed),
            None => image,
        })
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
