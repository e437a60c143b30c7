use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::inference::classifier::Classifier;
use crate::inference::features::FeatureBatch;
use crate::inference::mlp::MlpClassifier;

#[allow(dead_code)]
#[path = "../inference/mod.rs"]
mod inference;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the safetensors model artifact
    #[arg(short, long, env = "MODEL_PATH", default_value = "/app/models/model.safetensors")]
    pub model_path: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layer layout, feature count and class count of the model
    Inspect,

    /// Run the model locally on a JSON sample or batch
    Predict {
        /// Either `[f1,...,fn]` or `[[f1,...,fn], ...]`
        features: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let model = MlpClassifier::from_safetensors(Path::new(&args.model_path))?;

    match args.cmd {
        Commands::Inspect => {
            println!("Model: {}", args.model_path);
            for (index, (inputs, outputs)) in model.layer_shapes().iter().enumerate() {
                println!("  layers.{index}: {inputs} -> {outputs}");
            }
            println!("Features: {}", model.n_features());
            println!("Classes: {}", model.n_classes());
        }
        Commands::Predict { features } => {
            let value: Value =
                serde_json::from_str(&features).context("Features are not valid JSON")?;
            let batch = FeatureBatch::try_from(&value)?;
            let predictions = model.predict(&batch)?;
            println!(
                "{}",
                json!({ "input_shape": batch.shape(), "predictions": predictions })
            );
        }
    }
    Ok(())
}
