use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::api::templates::render_pipeline_error;
use crate::services::pipeline::{FailureReport, PipelineError};
use crate::utils::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Error: Missing required tools: {0}. Please install them to use this application.")]
    MissingDependency(String),

    #[error("Only PDF files are supported at this time")]
    UnsupportedMediaType,

    #[error("No file uploaded")]
    NoFileProvided,

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Pipeline failed with status {}", .0.result.exit_status)]
    PipelineFailure(Box<FailureReport>),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        match e.code {
            "NO_FILE" => AppError::NoFileProvided,
            "UNSUPPORTED_TYPE" => AppError::UnsupportedMediaType,
            _ => AppError::BadRequest(e.message),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        AppError::Unexpected(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Unexpected(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingDependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NoFileProvided => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PipelineFailure(report) => {
                // The failure page is a regular document, served with 200
                return Html(render_pipeline_error(report)).into_response();
            }
            AppError::Unexpected(msg) => {
                tracing::error!("Unexpected error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
