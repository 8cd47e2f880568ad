use std::sync::Arc;
use text2image::{
    logger::{self, LoggerConfig},
    server, CloudinaryClient, Config, ModelLoader, Studio,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::from_env())?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            log::error!(
                "Set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET \
                 (or CLOUDINARY_URL)"
            );
            return Err(e.into());
        }
    };
    logger::log_config_info(&config);

    // A model that cannot be loaded is fatal at startup.
    let loader = Arc::new(ModelLoader::new(config.model.clone()));
    if let Err(e) = loader.get_or_load().await {
        log::error!("💀 Could not load model {}: {}", config.model.model_id, e);
        return Err(e.into());
    }

    std::fs::create_dir_all(&config.server.work_dir)?;
    let host = Arc::new(CloudinaryClient::new(config.cloudinary.clone()));
    let studio = Studio::new(loader, host, &config.server.work_dir);

    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.server.host,
        config.server.port,
    );

    server::run(&config.server, studio).await?;
    Ok(())
}
