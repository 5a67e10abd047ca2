use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use seg_overlay::{router, tracing_config, Config, OnnxModel, SegmentationContext};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    tracing_config::init(&config.log_filter)?;

    let model_path = config.resolve_model_path()?;
    info!(path = %model_path.display(), "loading model");
    let model = OnnxModel::new(&model_path, config.device_id)?;

    let context = SegmentationContext::new(Arc::new(model));
    info!(spec = ?context.input_spec(), "model input spec");

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}; set PY_MODEL_PORT to a free port"))?;
    info!("segmentation service listening on http://{addr}");

    axum::serve(listener, router(Arc::new(context)))
        .await
        .context("server error")
}
