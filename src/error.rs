use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors the prediction pipeline can surface to a client.
///
/// The split matters for the HTTP mapping: decode failures are the
/// caller's fault (400) and are returned verbatim so the client can fix
/// the request; model and inference failures are ours (500) and are
/// returned as a generic message while the detail goes to the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid image: {0}")]
    Decode(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl ApiError {
    fn client_message(&self) -> String {
        match self {
            ApiError::Decode(_) => self.to_string(),
            ApiError::ModelUnavailable(_) => {
                "Model not loaded. Please try again in a few moments.".to_string()
            }
            ApiError::Inference(_) => "Prediction failed. Check server logs.".to_string(),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) | ApiError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
        })
    }
}

/// Why a model load attempt (or the whole load sequence) failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("model file not found: {0}")]
    ArtifactMissing(String),

    #[error("model file too small to be a serialized model ({size} bytes, need at least {min})")]
    ArtifactTooSmall { size: u64, min: u64 },

    #[error("failed to deserialize model: {0}")]
    Deserialize(String),

    #[error("model self-test failed: {0}")]
    SelfTest(String),

    #[error("model unavailable after {attempts} load attempts: {reason}")]
    Exhausted { reason: String, attempts: u32 },
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        ApiError::ModelUnavailable(err.to_string())
    }
}
