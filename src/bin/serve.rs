//! Standalone emotion service server.
//!
//! Runs the fusion engine with the built-in text classifier only; face and
//! voice channels are absent until model-backed classifiers and capture
//! sources are wired in, so every verdict is single-modality (and therefore
//! never authentic). Useful for exercising the HTTP surface and the chat
//! flow without camera/microphone hardware.

use candor::{EmotionServer, EmotionService, EngineConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("candor-serve failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> candor::Result<()> {
    let config_path = EngineConfig::default_config_path();
    let config = if config_path.exists() {
        tracing::info!("loading config from {}", config_path.display());
        EngineConfig::from_file(&config_path)?
    } else {
        EngineConfig::default()
    };

    let bind_addr = config.server.bind_addr.clone();
    let service = Arc::new(EmotionService::new(config, Vec::new()));
    let server = EmotionServer::start(service, &bind_addr).await?;

    tracing::info!("serving on {}", server.addr());
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();
    Ok(())
}
