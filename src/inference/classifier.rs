use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::inference::features::FeatureBatch;
use crate::inference::mlp::MlpClassifier;

/// A loaded model that maps every row of a batch to a class index.
pub trait Classifier: Send + Sync {
    /// Number of features each sample must have.
    fn n_features(&self) -> usize;

    /// Number of distinct classes the model can predict.
    fn n_classes(&self) -> usize;

    /// Returns one class index per row of `batch`, in row order.
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<u32>>;
}

/// Shared, read-only handle to the model loaded at startup.
pub type ModelHandle = Arc<dyn Classifier>;

#[tracing::instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelHandle> {
    let model = MlpClassifier::from_safetensors(path.as_ref())?;
    Ok(Arc::new(model))
}
