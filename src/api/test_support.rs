use std::io;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::inference::classifier::{Classifier, ModelHandle};
use crate::inference::features::FeatureBatch;
use crate::AppState;

/// Predicts the first feature truncated to an integer.
pub(crate) struct FirstFeature;

impl Classifier for FirstFeature {
    fn n_features(&self) -> usize {
        4
    }

    fn n_classes(&self) -> usize {
        10
    }

    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<u32>> {
        Ok(batch.rows().map(|row| row[0] as u32).collect())
    }
}

pub(crate) fn loaded() -> Option<ModelHandle> {
    Some(Arc::new(FirstFeature))
}

pub(crate) fn app(model: Option<ModelHandle>) -> Router {
    crate::create_router(AppState { model })
}

pub(crate) async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes INFO and above on the current thread into this buffer until the guard drops.
    pub(crate) fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
