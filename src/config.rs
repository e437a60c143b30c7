use anyhow::{Context, Result};
use clap_serde_derive::ClapSerde;

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub(crate) address: String,

    /// The port the listener binds to
    #[default(8000)]
    #[arg(short, long, env)]
    pub(crate) port: u16,

    /// Path to the safetensors model artifact loaded at startup
    #[default("/app/models/model.safetensors".to_string())]
    #[arg(short, long, env = "MODEL_PATH")]
    pub(crate) model_path: String,
}

impl Config {
    /// Reads a TOML file. Keys it leaves out keep their defaults.
    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {path}"))?;
        Self::parse_toml(&str)
    }

    fn parse_toml(str: &str) -> Result<Self> {
        let opt: <Config as ClapSerde>::Opt = toml::from_str(str)?;
        Ok(Config::from(opt))
    }
}
