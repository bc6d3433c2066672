use crate::features::ValidationError;
use crate::model::InferenceError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Body(#[from] JsonRejection),
    #[error("request body must be a JSON object")]
    NotAnObject,
}

impl ParseError {
    fn status(&self) -> StatusCode {
        match self {
            ParseError::Body(rejection) => rejection.status(),
            ParseError::NotAnObject => StatusCode::BAD_REQUEST,
        }
    }
}

/// Per-request failures, converted into a JSON error response at the handler boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Parse(err) => err.status(),
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Parse(_) => "parse_error",
            AppError::Validation(_) => "validation_error",
            AppError::Inference(_) => "inference_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Prediction failed: {}", self);
        } else {
            warn!("Rejected prediction request: {}", self);
        }

        let body = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
