use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, ensure};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::context::{utc_now_iso, RequestContext};
use crate::error::{ServiceError, ServiceResult};
use crate::inference::features::{FeatureBatch, ShapeError};
use crate::AppState;

#[derive(Serialize, Debug)]
pub struct PredictResponse {
    pub request_id: String,
    pub predictions: Vec<u32>,
    pub latency_ms: f64,
}

/// Accepts `[f1, .., fn]` or `[[f1, .., fn], ..]` and returns one prediction per sample.
#[axum_macros::debug_handler(state = AppState)]
pub(crate) async fn handle_predict_request(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServiceResult<Json<PredictResponse>> {
    let Some(model) = state.model.as_ref() else {
        error!("Model not loaded - returning 503");
        return Err(ServiceError::ModelNotLoaded);
    };

    let ctx = RequestContext::new();
    let path = uri.path();
    let client = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());

    let batch = match normalize(payload, model.n_features()) {
        Ok(batch) => batch,
        Err(reason) => {
            warn!(
                request_id = %ctx.id,
                timestamp = %utc_now_iso(),
                path,
                client = ?client,
                error = %reason,
                "RequestLog: rejected input"
            );
            return Err(reason.into());
        }
    };
    let (rows, cols) = (batch.n_samples(), batch.n_features());

    let model = Arc::clone(model);
    let outcome = tokio::task::spawn_blocking(move || model.predict(&batch))
        .await
        .map_err(|err| anyhow!("Prediction task did not complete: {err}"))
        .and_then(|result| result)
        .and_then(|predictions| {
            ensure!(
                predictions.len() == rows,
                "Model returned {} predictions for {rows} samples",
                predictions.len()
            );
            Ok(predictions)
        });
    let predictions = match outcome {
        Ok(predictions) => predictions,
        Err(err) => {
            error!(request_id = %ctx.id, error = ?err, "Prediction failed");
            return Err(ServiceError::PredictionFailed(err));
        }
    };

    let latency_ms = ctx.latency_ms();
    info!(
        request_id = %ctx.id,
        timestamp = %utc_now_iso(),
        input_shape = ?[rows, cols],
        predictions_count = predictions.len(),
        latency_ms,
        path,
        client = ?client,
        "RequestLog"
    );

    Ok(Json(PredictResponse {
        request_id: ctx.id.to_string(),
        predictions,
        latency_ms,
    }))
}

fn normalize(
    payload: Result<Json<Value>, JsonRejection>,
    n_features: usize,
) -> Result<FeatureBatch, ShapeError> {
    let Json(value) = payload.map_err(|rejection| ShapeError::Malformed(rejection.body_text()))?;
    let batch = FeatureBatch::try_from(&value)?;
    if batch.n_features() != n_features {
        return Err(ShapeError::FeatureCount {
            expected: n_features,
            found: batch.n_features(),
        });
    }
    Ok(batch)
}
