//! img2html REST API server

use core_pipeline::{Pipeline, PipelineConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = PipelineConfig::default();
    tracing::debug!("Pipeline config: {}", serde_json::to_string(&config)?);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    img2html_server::serve(addr, Pipeline::from_config(config)).await
}
