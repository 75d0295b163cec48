//! TCP accept loop for device connections.
//!
//! One independent connection per accepted socket. A connection that fails
//! to start (handshake timeout, bad identity) is logged and dropped; the
//! loop keeps accepting.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pindock_broker::MqttBridge;
use pindock_core::Result;

use crate::connection::Connection;

/// Accept device connections until cancellation.
///
/// # Errors
/// Returns an error only if the listener cannot bind.
pub async fn run(
    listen_port: u16,
    bridge: Arc<MqttBridge>,
    token: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", listen_port)).await?;
    info!(port = listen_port, "listening for devices");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("device listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };

                info!(%peer, "device connected");

                // Command/reply lines are tiny; never let them sit in a
                // Nagle buffer.
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(%peer, "failed to set TCP_NODELAY: {e}");
                }

                let connection = Arc::new(Connection::new(stream, Arc::clone(&bridge), &token));
                tokio::spawn(async move {
                    if let Err(e) = connection.start().await {
                        warn!(%peer, "connection failed to start: {e}");
                    }
                });
            }
        }
    }
}
