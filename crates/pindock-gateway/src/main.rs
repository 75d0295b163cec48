//! Process bootstrap: settings, logging, broker bridge, device listener,
//! and shutdown signal handling.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pindock_broker::MqttBridge;
use pindock_gateway::{Settings, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "settings.json".to_string());
    let settings = Settings::load(Path::new(&path))
        .with_context(|| format!("loading settings from {path}"))?;

    info!(
        version = pindock_core::VERSION,
        sensors = settings.sensors.len(),
        "pindock starting"
    );

    let token = CancellationToken::new();

    let (bridge, eventloop) = MqttBridge::new(settings.mqtt.clone(), settings.sensors.clone());
    let bridge_task = tokio::spawn(Arc::clone(&bridge).run(eventloop, token.clone()));

    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let result = server::run(settings.listen_port, bridge, token.clone()).await;

    token.cancel();
    let _ = bridge_task.await;
    info!("server shutdown");

    result.context("device listener failed")
}
