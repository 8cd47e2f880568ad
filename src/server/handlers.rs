use crate::{
    error::GenError,
    generation::Studio,
    models::{GenerationOutcome, Prompt},
    server::views,
};
use actix_web::{
    http::{header::ContentType, StatusCode},
    web, HttpResponse, Responder,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub request_id: String,
    pub prompt: String,
    pub model: String,
    pub elapsed_ms: u128,
    pub image_url: Option<String>,
    pub public_id: Option<String>,
    pub optimized_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
}

impl From<&GenerationOutcome> for GenerateResponse {
    fn from(outcome: &GenerationOutcome) -> Self {
        let uploaded = outcome.upload.as_ref().ok();
        Self {
            request_id: outcome.request_id.clone(),
            prompt: outcome.prompt.clone(),
            model: outcome.model.clone(),
            elapsed_ms: outcome.elapsed.as_millis(),
            image_url: uploaded.map(|img| img.secure_url.clone()),
            public_id: uploaded.map(|img| img.public_id.clone()),
            optimized_url: uploaded.map(|img| img.optimized_url.clone()),
            thumbnail_url: uploaded.map(|img| img.thumbnail_url.clone()),
            error: outcome.upload.as_ref().err().map(|e| e.to_string()),
        }
    }
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(body)
}

pub async fn index() -> impl Responder {
    html(StatusCode::OK, views::idle_page(""))
}

pub async fn generate_page(
    studio: web::Data<Studio>,
    form: web::Form<GenerateForm>,
) -> HttpResponse {
    // Blank input never reaches the model.
    let prompt = match Prompt::new(&form.prompt) {
        Ok(prompt) => prompt,
        Err(_) => return html(StatusCode::OK, views::idle_page(&form.prompt)),
    };

    match studio.generate(&prompt).await {
        Ok(outcome) => html(StatusCode::OK, views::result_page(&outcome)),
        Err(e) => {
            log::error!("Generation failed: {}", e);
            html(
                StatusCode::INTERNAL_SERVER_ERROR,
                views::error_page(prompt.as_str(), &e.to_string()),
            )
        }
    }
}

pub async fn generate_api(
    studio: web::Data<Studio>,
    body: web::Json<GenerateForm>,
) -> HttpResponse {
    let prompt = match Prompt::new(&body.prompt) {
        Ok(prompt) => prompt,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
    };

    match studio.generate(&prompt).await {
        Ok(outcome) => {
            let response = GenerateResponse::from(&outcome);
            if outcome.upload.is_ok() {
                HttpResponse::Ok().json(response)
            } else {
                HttpResponse::BadGateway().json(response)
            }
        }
        Err(e) => {
            log::error!("Generation failed: {}", e);
            let mut response = match &e {
                GenError::ModelLoad(_) => HttpResponse::ServiceUnavailable(),
                _ => HttpResponse::InternalServerError(),
            };
            response.json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}

pub async fn health(studio: web::Data<Studio>) -> HttpResponse {
    match studio.model_info().await {
        Ok(info) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "model": info,
            "host": studio.host_name(),
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unavailable",
            "error": e.to_string(),
        })),
    }
}
