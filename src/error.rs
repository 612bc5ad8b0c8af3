use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid input image: {0}")]
    InvalidInput(String),

    #[error("Detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Inference pass failed: {0}")]
    InferenceError(String),

    #[error("Failed to score detection: {0}")]
    ScoringError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Failed to render detections: {0}")]
    RenderError(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Analysis timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "INVALID_INPUT",
            AnalysisError::DetectorUnavailable(_) => "DETECTOR_UNAVAILABLE",
            AnalysisError::InferenceError(_) => "INFERENCE_ERROR",
            AnalysisError::ScoringError(_) => "SCORING_ERROR",
            AnalysisError::PreprocessingError(_) => "PREPROCESSING_ERROR",
            AnalysisError::RenderError(_) => "RENDER_ERROR",
            AnalysisError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            AnalysisError::MissingFile => "MISSING_FILE",
            AnalysisError::InvalidRequest(_) => "INVALID_REQUEST",
            AnalysisError::UnknownLabel(_) => "UNKNOWN_LABEL",
            AnalysisError::Timeout(_) => "TIMEOUT",
            AnalysisError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AnalysisError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::DetectorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AnalysisError::MissingFile | AnalysisError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalysisError::UnknownLabel(_) => StatusCode::NOT_FOUND,
            AnalysisError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AnalysisError::InferenceError(_)
            | AnalysisError::ScoringError(_)
            | AnalysisError::PreprocessingError(_)
            | AnalysisError::RenderError(_)
            | AnalysisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_request_failures_map_to_client_or_service_errors() {
        let invalid = AnalysisError::InvalidInput("1 channel".into()).into_response();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let missing = AnalysisError::DetectorUnavailable("not loaded".into()).into_response();
        assert_eq!(missing.status(), StatusCode::SERVICE_UNAVAILABLE);

        let render = AnalysisError::RenderError("empty canvas".into()).into_response();
        assert_eq!(render.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_message_includes_reason() {
        let err = AnalysisError::ImageTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "Image too large: 10 bytes (max: 5 bytes)");
        assert_eq!(err.code(), "IMAGE_TOO_LARGE");
    }
}
