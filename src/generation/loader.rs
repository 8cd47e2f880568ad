use crate::{
    config::{ModelBackend, ModelConfig},
    error::{GenError, Result},
    generation::{hosted::HostedModel, ModelHandle},
};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Resolves the configured model on first use and hands out the same handle
/// for the rest of the process.
pub struct ModelLoader {
    config: ModelConfig,
    handle: OnceCell<ModelHandle>,
}

impl ModelLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    /// A loader that already holds `handle` and never loads anything itself.
    pub fn preloaded(config: ModelConfig, handle: ModelHandle) -> Self {
        Self {
            config,
            handle: OnceCell::new_with(Some(handle)),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    /// Concurrent first callers wait on a single initialization; a failed
    /// load leaves the cell empty.
    pub async fn get_or_load(&self) -> Result<ModelHandle> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let _timer = crate::logger::timer("model load");
                log::info!(
                    "📦 Loading model {} ({} backend)",
                    self.config.model_id,
                    self.config.backend.as_str()
                );
                let handle = load(&self.config).await?;
                let info = handle.info();
                log::info!(
                    "✅ Model {} ready on {} ({})",
                    info.id,
                    info.device,
                    info.precision
                );
                Ok::<ModelHandle, GenError>(handle)
            })
            .await?;

        Ok(Arc::clone(handle))
    }
}

async fn load(config: &ModelConfig) -> Result<ModelHandle> {
    match config.backend {
        ModelBackend::Hosted => {
            let model = HostedModel::resolve(config).await?;
            Ok(Arc::new(model))
        }
        ModelBackend::Local => load_local(config).await,
    }
}

#[cfg(feature = "local")]
async fn load_local(config: &ModelConfig) -> Result<ModelHandle> {
    let config = config.clone();
    let model = tokio::task::spawn_blocking(move || {
        crate::generation::local::LocalDiffusionModel::load(&config)
    })
    .await
    .map_err(|e| GenError::ModelLoad(e.to_string()))??;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "local"))]
async fn load_local(_config: &ModelConfig) -> Result<ModelHandle> {
    Err(GenError::ModelLoad(
        "local backend requires building with the `local` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::FakeModel;

    #[tokio::test]
    async fn test_preloaded_returns_same_instance() {
        let fake: ModelHandle = Arc::new(FakeModel::new());
        let loader = ModelLoader::preloaded(ModelConfig::default(), fake.clone());

        assert!(loader.is_loaded());
        let first = loader.get_or_load().await.unwrap();
        let second = loader.get_or_load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &fake));
    }

    #[cfg(not(feature = "local"))]
    #[tokio::test]
    async fn test_local_backend_without_feature_fails_to_load() {
        let loader = ModelLoader::new(ModelConfig::default().with_backend(ModelBackend::Local));

        let err = loader.get_or_load().await.err().unwrap();
        assert!(matches!(err, GenError::ModelLoad(_)));
        assert!(!loader.is_loaded());
    }

    #[cfg(feature = "server")]
    mod against_local_hub {
        use super::*;
        use actix_web::{web, App, HttpResponse, HttpServer};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        /// A hub that counts metadata lookups and answers after `delay`.
        fn spawn_hub(hits: Arc<AtomicUsize>, delay: Duration) -> String {
            let server = HttpServer::new(move || {
                let hits = hits.clone();
                App::new().route(
                    "/api/models/{owner}/{name}",
                    web::get().to(move || {
                        let hits = hits.clone();
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            actix_web::rt::time::sleep(delay).await;
                            HttpResponse::Ok().json(serde_json::json!({
                                "id": "runwayml/stable-diffusion-v1-5",
                                "pipeline_tag": "text-to-image"
                            }))
                        }
                    }),
                )
            })
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
            let base = format!("http://{}", server.addrs()[0]);
            actix_web::rt::spawn(server.run());
            base
        }

        #[actix_web::test]
        async fn test_hosted_model_is_resolved_once() {
            let hits = Arc::new(AtomicUsize::new(0));
            let base = spawn_hub(hits.clone(), Duration::ZERO);

            let loader = ModelLoader::new(ModelConfig::default().with_endpoints(&base, &base));
            let first = loader.get_or_load().await.unwrap();
            let second = loader.get_or_load().await.unwrap();

            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert_eq!(first.info().id, "runwayml/stable-diffusion-v1-5");
        }

        #[actix_web::test]
        async fn test_concurrent_first_callers_share_one_load() {
            let hits = Arc::new(AtomicUsize::new(0));
            let base = spawn_hub(hits.clone(), Duration::from_millis(100));

            let loader = ModelLoader::new(ModelConfig::default().with_endpoints(&base, &base));
            let (a, b, c) = tokio::join!(
                loader.get_or_load(),
                loader.get_or_load(),
                loader.get_or_load()
            );
            let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

            assert!(Arc::ptr_eq(&a, &b));
            assert!(Arc::ptr_eq(&b, &c));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }
}
