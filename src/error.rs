use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::inference::features::ShapeError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Invalid features: {0}")]
    InvalidFeatures(#[from] ShapeError),

    /// The source is only ever logged, the client sees the generic message.
    #[error("Prediction failed")]
    PredictionFailed(#[source] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidFeatures(_) => StatusCode::BAD_REQUEST,
            ServiceError::PredictionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HttpErrorResponse {
    detail: String,
}

impl From<String> for HttpErrorResponse {
    fn from(detail: String) -> Self {
        HttpErrorResponse { detail }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let mut res = Json(HttpErrorResponse::from(self.to_string())).into_response();
        *res.status_mut() = self.status();
        res
    }
}

pub type ServiceResult<T, E = ServiceError> = Result<T, E>;
