use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use candle_core::{safetensors, DType, Device, Tensor, D};
use candle_nn::{Linear, Module};
use tracing::debug;

use crate::inference::classifier::Classifier;
use crate::inference::features::FeatureBatch;

/// Dense feed-forward classifier read from a safetensors file.
///
/// Layers are stored as `layers.{i}.weight` with shape `[out, in]` and an optional
/// `layers.{i}.bias` with shape `[out]`, numbered from zero without gaps. Hidden
/// layers are followed by a ReLU, the last layer yields one score per class and
/// the prediction is the index of the highest score.
pub struct MlpClassifier {
    layers: Vec<Linear>,
    shapes: Vec<(usize, usize)>,
    device: Device,
}

impl MlpClassifier {
    #[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn from_safetensors(path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let tensors = safetensors::load(path, &device)
            .with_context(|| format!("Failed to read safetensors file {}", path.display()))?;
        Self::from_tensors(tensors, device)
    }

    fn from_tensors(mut tensors: HashMap<String, Tensor>, device: Device) -> Result<Self> {
        let mut layers = Vec::new();
        let mut shapes: Vec<(usize, usize)> = Vec::new();

        for index in 0.. {
            let Some(weight) = tensors.remove(&format!("layers.{index}.weight")) else {
                break;
            };
            let (out_dim, in_dim) = weight
                .dims2()
                .with_context(|| format!("layers.{index}.weight must be a matrix"))?;
            ensure!(
                out_dim > 0 && in_dim > 0,
                "layers.{index}.weight has an empty dimension ({out_dim}x{in_dim})"
            );
            if let Some((_, previous_out)) = shapes.last() {
                ensure!(
                    *previous_out == in_dim,
                    "layers.{index}.weight takes {in_dim} inputs but layers.{}.weight produces {previous_out}",
                    index - 1
                );
            }

            let bias = match tensors.remove(&format!("layers.{index}.bias")) {
                Some(bias) => {
                    let len = bias
                        .dims1()
                        .with_context(|| format!("layers.{index}.bias must be a vector"))?;
                    ensure!(
                        len == out_dim,
                        "layers.{index}.bias has {len} entries, expected {out_dim}"
                    );
                    Some(bias.to_dtype(DType::F32)?)
                }
                None => None,
            };

            debug!(index, in_dim, out_dim, "loaded dense layer");
            layers.push(Linear::new(weight.to_dtype(DType::F32)?, bias));
            shapes.push((in_dim, out_dim));
        }

        if layers.is_empty() {
            bail!("Model file has no layers.0.weight tensor");
        }
        if !tensors.is_empty() {
            let mut unused: Vec<&String> = tensors.keys().collect();
            unused.sort();
            debug!(?unused, "ignoring tensors outside the layer sequence");
        }

        Ok(Self {
            layers,
            shapes,
            device,
        })
    }

    /// `(inputs, outputs)` of every layer in evaluation order.
    pub fn layer_shapes(&self) -> &[(usize, usize)] {
        &self.shapes
    }
}

impl Classifier for MlpClassifier {
    fn n_features(&self) -> usize {
        self.shapes[0].0
    }

    fn n_classes(&self) -> usize {
        self.shapes[self.shapes.len() - 1].1
    }

    #[tracing::instrument(level = "debug", skip_all, fields(shape = ?batch.shape()))]
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<u32>> {
        ensure!(
            batch.n_features() == self.n_features(),
            "model expects {} features, got {}",
            self.n_features(),
            batch.n_features()
        );

        let mut xs = Tensor::from_vec(batch.to_f32_vec(), batch.shape(), &self.device)?;
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if index < last {
                xs = xs.relu()?;
            }
        }

        Ok(xs.argmax(D::Minus1)?.to_vec1::<u32>()?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn write_model(dir: &TempDir, tensors: Vec<(&str, Tensor)>) -> std::path::PathBuf {
        let path = dir.path().join("model.safetensors");
        let tensors: HashMap<String, Tensor> = tensors
            .into_iter()
            .map(|(name, tensor)| (name.to_string(), tensor))
            .collect();
        safetensors::save(&tensors, &path).unwrap();
        path
    }

    fn matrix(values: &[f32], rows: usize, cols: usize) -> Tensor {
        Tensor::from_vec(values.to_vec(), (rows, cols), &Device::Cpu).unwrap()
    }

    fn vector(values: &[f32]) -> Tensor {
        Tensor::from_vec(values.to_vec(), values.len(), &Device::Cpu).unwrap()
    }

    fn batch(value: serde_json::Value) -> FeatureBatch {
        FeatureBatch::try_from(&value).unwrap()
    }

    #[test]
    fn single_layer_picks_the_highest_score() {
        let dir = TempDir::new().unwrap();
        // Class i scores feature i, so the argmax is the largest feature.
        let path = write_model(
            &dir,
            vec![(
                "layers.0.weight",
                matrix(&[1., 0., 0., 0., 1., 0., 0., 0., 1.], 3, 3),
            )],
        );

        let model = MlpClassifier::from_safetensors(&path).unwrap();
        assert_eq!(model.n_features(), 3);
        assert_eq!(model.n_classes(), 3);

        let predictions = model
            .predict(&batch(json!([[9.0, 1.0, 2.0], [0.0, 0.5, 4.0], [1.0, 7.0, 3.0]])))
            .unwrap();
        assert_eq!(predictions, vec![0, 2, 1]);
    }

    #[test]
    fn hidden_layers_apply_relu_and_bias() {
        let dir = TempDir::new().unwrap();
        // Hidden unit = relu(x0 - x1). Class 1 wins once the unit exceeds the bias of class 0.
        let path = write_model(
            &dir,
            vec![
                ("layers.0.weight", matrix(&[1., -1.], 1, 2)),
                ("layers.0.bias", vector(&[0.])),
                ("layers.1.weight", matrix(&[0., 1.], 2, 1)),
                ("layers.1.bias", vector(&[1., 0.])),
            ],
        );

        let model = MlpClassifier::from_safetensors(&path).unwrap();
        assert_eq!(model.layer_shapes(), &[(2, 1), (1, 2)]);

        let predictions = model
            .predict(&batch(json!([[5.0, 1.0], [1.0, 5.0]])))
            .unwrap();
        assert_eq!(predictions, vec![1, 0]);
    }

    #[test]
    fn f64_weights_are_converted() {
        let dir = TempDir::new().unwrap();
        let weight = Tensor::from_vec(vec![0f64, 1., 1., 0.], (2, 2), &Device::Cpu).unwrap();
        let path = write_model(&dir, vec![("layers.0.weight", weight)]);

        let model = MlpClassifier::from_safetensors(&path).unwrap();
        assert_eq!(model.predict(&batch(json!([3.0, 1.0]))).unwrap(), vec![1]);
    }

    #[test]
    fn missing_first_layer_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, vec![("layers.1.weight", matrix(&[1.], 1, 1))]);
        let err = MlpClassifier::from_safetensors(&path).err().unwrap();
        assert!(err.to_string().contains("layers.0.weight"));
    }

    #[test]
    fn broken_layer_chain_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_model(
            &dir,
            vec![
                ("layers.0.weight", matrix(&[1., 0., 0., 1.], 2, 2)),
                ("layers.1.weight", matrix(&[1., 1., 1.], 1, 3)),
            ],
        );
        let err = MlpClassifier::from_safetensors(&path).err().unwrap();
        assert!(err.to_string().contains("takes 3 inputs"));
    }

    #[test]
    fn empty_weight_dimensions_are_rejected() {
        let dir = TempDir::new().unwrap();
        let empty = Tensor::zeros((0, 3), DType::F32, &Device::Cpu).unwrap();
        let path = write_model(&dir, vec![("layers.0.weight", empty)]);
        let err = MlpClassifier::from_safetensors(&path).err().unwrap();
        assert!(err.to_string().contains("empty dimension"), "{err}");
    }

    #[test]
    fn bias_length_must_match_outputs() {
        let dir = TempDir::new().unwrap();
        let path = write_model(
            &dir,
            vec![
                ("layers.0.weight", matrix(&[1., 0., 0., 1.], 2, 2)),
                ("layers.0.bias", vector(&[0., 0., 0.])),
            ],
        );
        assert!(MlpClassifier::from_safetensors(&path).is_err());
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = MlpClassifier::from_safetensors(&dir.path().join("missing.safetensors"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing.safetensors"));
    }

    #[test]
    fn wrong_feature_count_fails_prediction() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, vec![("layers.0.weight", matrix(&[1., 0., 0., 1.], 2, 2))]);
        let model = MlpClassifier::from_safetensors(&path).unwrap();
        assert!(model.predict(&batch(json!([1.0, 2.0, 3.0]))).is_err());
    }
}
