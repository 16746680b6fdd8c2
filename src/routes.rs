use std::io::Write;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{Error, HttpRequest, HttpResponse, web};
use futures_util::{StreamExt, TryStreamExt};
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dto::{
    Base64PredictRequest, DiseaseInfo, DiseasesResponse, HealthResponse, ModelInfo,
    ModelInfoResponse, PredictResponse,
};
use crate::error::ApiError;
use crate::interpret::interpret;
use crate::model::demo::DemoCatalogue;
use crate::model::{LifecycleManager, infer::infer};
use crate::preprocess::{decode_base64_image, decode_image, normalize};
use crate::taxonomy::DiseaseTaxonomy;

/// Everything a request handler needs, wired once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub taxonomy: DiseaseTaxonomy,
    pub lifecycle: Arc<LifecycleManager>,
    pub demo: DemoCatalogue,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/diseases").route(web::get().to(diseases)))
        .service(web::resource("/model-info").route(web::get().to(model_info)));
}

async fn index(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Rice Disease Detection API",
        "status": "running",
        "model_loaded": state.lifecycle.is_ready(),
        "endpoints": {
            "health": "/health",
            "predict": "/predict",
            "diseases": "/diseases",
            "model_info": "/model-info",
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.lifecycle.is_ready(),
        lifecycle: state.lifecycle.state_label().to_string(),
        num_classes: state.taxonomy.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Accepts either a multipart form with an `image` file field or a JSON
/// body `{"image_base64": ...}`.
async fn predict(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request_id = Uuid::new_v4();

    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let image = if content_type.starts_with("multipart/") {
        let bytes = read_image_field(Multipart::new(req.headers(), payload)).await?;
        decode_image(&bytes)?
    } else if content_type.starts_with("application/json") {
        let body = read_body(payload).await?;
        let request: Base64PredictRequest = serde_json::from_slice(&body)
            .map_err(|_| ApiError::Decode(
                "No image provided. Send as 'image' file or 'image_base64' in JSON".to_string(),
            ))?;
        decode_base64_image(&request.image_base64)?
    } else {
        return Err(ApiError::Decode(
            "No image provided. Send as 'image' file or 'image_base64' in JSON".to_string(),
        )
        .into());
    };

    let response = match state.lifecycle.ensure_ready() {
        Ok(handle) => {
            let tensor = normalize(&image, state.config.input_size, state.config.normalization);
            let scores = infer(&handle, &tensor)?;
            let interpretation = interpret(scores, &state.taxonomy)?;
            info!(
                "[{}] prediction: {} ({:.3})",
                request_id,
                state.taxonomy.entries()[interpretation.top_index].name,
                interpretation.confidence
            );
            PredictResponse::build(&interpretation, &state.taxonomy, false)
        }
        Err(load_err) => {
            if state.config.load_policy.demo_fallback() && !state.demo.is_empty() {
                warn!("[{}] model unavailable ({}), serving demo mode", request_id, load_err);
                let scores = state
                    .demo
                    .synthesize(state.taxonomy.len())
                    .ok_or_else(|| ApiError::from(load_err))?;
                let interpretation = interpret(scores, &state.taxonomy)?;
                PredictResponse::build(&interpretation, &state.taxonomy, true)
            } else {
                return Err(ApiError::from(load_err).into());
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

async fn diseases(state: web::Data<AppState>) -> HttpResponse {
    let diseases = state
        .taxonomy
        .entries()
        .iter()
        .map(|entry| DiseaseInfo {
            name: entry.name.clone(),
            category: entry.category.as_str().to_string(),
            treatment: entry.treatment.clone(),
        })
        .collect();
    HttpResponse::Ok().json(DiseasesResponse { diseases })
}

async fn model_info(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let handle = state
        .lifecycle
        .handle()
        .ok_or_else(|| ApiError::ModelUnavailable("model not loaded".to_string()))?;
    Ok(HttpResponse::Ok().json(ModelInfoResponse {
        model_info: ModelInfo {
            architecture: state.config.architecture.clone(),
            input_size: [handle.input_size.0, handle.input_size.1],
            num_classes: handle.num_classes,
            classes: state.taxonomy.class_names(),
            parameters: handle.parameters,
            loaded_at: handle.loaded_at.to_rfc3339(),
        },
    }))
}

/// Streams the multipart form and returns the bytes of the `image` field.
async fn read_image_field(mut payload: Multipart) -> Result<Vec<u8>, Error> {
    while let Ok(Some(mut field)) = payload.try_next().await {
        if field.name() != Some("image") {
            continue;
        }
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            image_data.write_all(&data)?;
        }
        if image_data.is_empty() {
            return Err(ApiError::Decode("No image file selected".to_string()).into());
        }
        return Ok(image_data);
    }
    Err(ApiError::Decode(
        "No image provided. Send as 'image' file or 'image_base64' in JSON".to_string(),
    )
    .into())
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(body)
}
