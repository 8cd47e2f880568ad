use crate::{
    cloudinary::{
        signature::sign_params,
        traits::ImageHost,
        url::{CloudinaryUrl, Transformation},
    },
    config::CloudinaryConfig,
    error::UploadFailure,
    models::{CloudinaryErrorBody, CloudinaryUploadResponse, UploadResult, UploadedImage},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use std::collections::BTreeMap;
use std::path::Path;

const THUMBNAIL_SIZE: u32 = 500;

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
    urls: CloudinaryUrl,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        let urls = CloudinaryUrl::new(&config.delivery_prefix, &config.cloud_name);
        Self {
            client: Client::new(),
            config,
            urls,
        }
    }

    pub fn upload_endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.config.upload_prefix, self.config.cloud_name
        )
    }

    /// Form fields for a signed upload at `timestamp`, signature included.
    pub fn signed_params(&self, timestamp: i64) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("timestamp".to_string(), timestamp.to_string());
        if let Some(folder) = &self.config.folder {
            params.insert("folder".to_string(), folder.clone());
        }

        let signature = sign_params(
            &params,
            &self.config.api_secret,
            self.config.signature_algorithm,
        );
        params.insert("signature".to_string(), signature);
        params.insert("api_key".to_string(), self.config.api_key.clone());
        params
    }

    async fn send_file(&self, path: &Path) -> UploadResult {
        if !path.is_file() {
            return Err(UploadFailure::FileMissing(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadFailure::Io(e.to_string()))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        let mut form = Form::new();
        for (key, value) in self.signed_params(Utc::now().timestamp()) {
            form = form.text(key, value);
        }
        let form = form.part("file", part);

        let endpoint = self.upload_endpoint();
        log::debug!("Uploading {} to {}", path.display(), endpoint);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<CloudinaryErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(UploadFailure::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CloudinaryUploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadFailure::MalformedResponse(e.to_string()))?;

        Ok(self.describe(parsed))
    }

    fn describe(&self, response: CloudinaryUploadResponse) -> UploadedImage {
        UploadedImage {
            optimized_url: self
                .urls
                .build(&response.public_id, &Transformation::optimized()),
            thumbnail_url: self
                .urls
                .build(&response.public_id, &Transformation::auto_crop(THUMBNAIL_SIZE)),
            public_id: response.public_id,
            secure_url: response.secure_url,
            format: response.format,
            width: response.width,
            height: response.height,
            bytes: response.bytes,
        }
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, path: &Path) -> UploadResult {
        match self.send_file(path).await {
            Ok(image) => {
                log::info!("☁️  Uploaded {} as {}", path.display(), image.public_id);
                Ok(image)
            }
            Err(failure) => {
                log::error!("Upload failed: {}", failure);
                Err(failure)
            }
        }
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
