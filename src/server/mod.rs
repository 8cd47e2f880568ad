pub mod handlers;
pub mod views;

use crate::{config::ServerConfig, generation::Studio};
use actix_web::{middleware, web, App, HttpServer};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/generate", web::post().to(handlers::generate_page))
        .route("/api/generate", web::post().to(handlers::generate_api))
        .route("/health", web::get().to(handlers::health));
}

/// Serves the page until the process is stopped.
pub async fn run(config: &ServerConfig, studio: Studio) -> std::io::Result<()> {
    let studio = web::Data::new(studio);

    HttpServer::new(move || {
        App::new()
            .app_data(studio.clone())
            .wrap(middleware::Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::generation::testing::{FakeHost, FakeModel, FAKE_URL};
    use crate::generation::{ModelHandle, ModelLoader};
    use actix_web::{http::StatusCode, test};
    use std::sync::Arc;

    fn studio(
        model: Arc<FakeModel>,
        host: Arc<FakeHost>,
        dir: &std::path::Path,
    ) -> web::Data<Studio> {
        let handle: ModelHandle = model;
        let loader = Arc::new(ModelLoader::preloaded(ModelConfig::default(), handle));
        web::Data::new(Studio::new(loader, host, dir))
    }

    async fn body_text(resp: actix_web::dev::ServiceResponse) -> String {
        let bytes = test::read_body(resp).await;
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn test_index_renders_controls() {
        let dir = tempfile::tempdir().unwrap();
        let data = studio(Arc::new(FakeModel::new()), Arc::new(FakeHost::new()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_text(resp).await;
        assert!(body.contains(views::TITLE));
        assert!(body.contains(views::BUTTON_LABEL));
    }

    #[actix_web::test]
    async fn test_empty_prompt_does_not_trigger_generation() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(FakeModel::new());
        let host = Arc::new(FakeHost::new());
        let data = studio(model.clone(), host.clone(), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        for prompt in ["", "   "] {
            let req = test::TestRequest::post()
                .uri("/generate")
                .set_form([("prompt", prompt)])
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(!body_text(resp).await.contains("<img"));
        }

        assert_eq!(model.calls(), 0);
        assert!(host.uploads().is_empty());
    }

    #[actix_web::test]
    async fn test_prompt_renders_hosted_image() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(FakeModel::new());
        let data = studio(model.clone(), Arc::new(FakeHost::new()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_form([("prompt", "a cute cat on a bike")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_text(resp).await;
        assert!(body.contains(&format!("<img src=\"{}\"", FAKE_URL)));
        assert!(body.contains(&format!("<a href=\"{}\"", FAKE_URL)));
        assert!(body.contains(views::CAPTION));
        assert_eq!(model.calls(), 1);
    }

    #[actix_web::test]
    async fn test_upload_failure_shows_banner() {
        let dir = tempfile::tempdir().unwrap();
        let data = studio(Arc::new(FakeModel::new()), Arc::new(FakeHost::failing()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_form([("prompt", "a cute cat on a bike")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_text(resp).await;
        assert!(body.contains(views::UPLOAD_FAILED));
        assert!(!body.contains("<img"));
    }

    #[actix_web::test]
    async fn test_generation_failure_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::new());
        let data = studio(Arc::new(FakeModel::failing()), host.clone(), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_form([("prompt", "a cute cat on a bike")])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("CUDA out of memory"));
        assert!(host.uploads().is_empty());
    }

    #[actix_web::test]
    async fn test_json_api() {
        let dir = tempfile::tempdir().unwrap();
        let data = studio(Arc::new(FakeModel::new()), Arc::new(FakeHost::new()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/generate")
            .set_json(serde_json::json!({ "prompt": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/generate")
            .set_json(serde_json::json!({ "prompt": "a cute cat on a bike" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["image_url"], FAKE_URL);
        assert!(body["error"].is_null());
    }

    #[actix_web::test]
    async fn test_json_api_upload_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let data = studio(Arc::new(FakeModel::new()), Arc::new(FakeHost::failing()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/generate")
            .set_json(serde_json::json!({ "prompt": "a cute cat on a bike" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_health_reports_model() {
        let dir = tempfile::tempdir().unwrap();
        let data = studio(Arc::new(FakeModel::new()), Arc::new(FakeHost::new()), dir.path());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["model"]["id"], "fake/diffusion");
        assert_eq!(body["model"]["device"], "cpu");
        assert_eq!(body["host"], "fake");
    }
}
