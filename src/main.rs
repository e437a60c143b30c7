use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::health::{handle_health_request, handle_ready_request};
use crate::api::predict::handle_predict_request;
use crate::config::Config;
use crate::inference::classifier::{load_model, ModelHandle};
use crate::telemetry::init_telemetry;

mod api;
mod config;
mod error;
mod inference;
mod telemetry;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_CONFIG_FILE: &str = "IrisApi.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// OTLP gRPC endpoint that receives traces and metrics
    #[arg(long, env)]
    otel_endpoint: Option<String>,

    /// Keep logging to the console while exporting to OTLP
    #[arg(long)]
    console: bool,

    /// PEM certificate, serves HTTPS together with --tls-key-path
    #[arg(long, env, requires = "tls_key_path")]
    tls_cert_path: Option<PathBuf>,

    /// PEM private key, serves HTTPS together with --tls-cert-path
    #[arg(long, env, requires = "tls_cert_path")]
    tls_key_path: Option<PathBuf>,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

/// State shared by every handler. Built once before the listener starts and never mutated.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) model: Option<ModelHandle>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(&args.otel_endpoint, args.console)?;

    let config = match Config::from_toml(&args.config_file) {
        Ok(conf) => conf.merge(args.opt_config),
        Err(err) => {
            if args.config_file == DEFAULT_CONFIG_FILE {
                Config::default().merge(args.opt_config)
            } else {
                return Err(err);
            }
        }
    };

    let model = match load_model(&config.model_path) {
        Ok(model) => {
            info!(
                "Loaded model from {} ({} features, {} classes)",
                config.model_path,
                model.n_features(),
                model.n_classes()
            );
            Some(model)
        }
        Err(err) => {
            error!(error = ?err, "Failed loading model from {}", config.model_path);
            None
        }
    };

    let router = create_router(AppState { model })
        .into_make_service_with_connect_info::<SocketAddr>();
    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.address, config.port
            )
        })?;

    match (args.tls_cert_path, args.tls_key_path) {
        (Some(cert), Some(key)) => {
            let tls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .context("Failed to load TLS certificate or key")?;
            let handle = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                async move {
                    shutdown_signal().await;
                    handle.graceful_shutdown(Some(Duration::from_secs(10)));
                }
            });

            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router)
                .await?;
        }
        (None, None) => {
            let listener = TcpListener::bind(addr).await?;
            info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        _ => bail!("Both --tls-cert-path and --tls-key-path are required to serve HTTPS"),
    }
    Ok(())
}

pub(crate) fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_health_request))
        .route("/ready", get(handle_ready_request))
        .route("/predict/", post(handle_predict_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
