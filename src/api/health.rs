use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::context::utc_now_iso;
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
    pub message: &'static str,
}

#[derive(Serialize, Debug)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Liveness check, answers regardless of whether a model is loaded.
#[axum_macros::debug_handler]
pub(crate) async fn handle_health_request() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time: utc_now_iso(),
        message: "Iris Prediction API listening",
    })
}

#[axum_macros::debug_handler(state = AppState)]
pub(crate) async fn handle_ready_request(
    State(state): State<AppState>,
) -> ServiceResult<Json<ReadyResponse>> {
    let model = state.model.as_ref().ok_or(ServiceError::ModelNotLoaded)?;
    Ok(Json(ReadyResponse {
        status: "ready",
        n_features: model.n_features(),
        n_classes: model.n_classes(),
    }))
}
