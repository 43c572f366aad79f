//! Graceful termination for the binary: waits for ctrl+c and stops the node.

use crate::error::AppError;
use crate::node::Node;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on how long a graceful stop may take
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ShutdownManager {
    node: Arc<Node>,
    timeout: Duration,
}

impl ShutdownManager {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            timeout: SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for ctrl+c (or for the node to stop on its own), then stop it
    pub async fn wait_for_shutdown(self) -> Result<(), AppError> {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => tracing::info!("🛑 Shutdown signal received"),
                    Err(e) => {
                        tracing::error!("Failed to listen for shutdown signal: {}", e);
                        self.node.wait().await;
                    }
                }
            }
            _ = self.node.wait() => {
                tracing::info!("🛑 Node stopped");
            }
        }

        match tokio::time::timeout(self.timeout, self.node.stop()).await {
            Ok(result) => {
                tracing::info!("✓ Node shut down gracefully");
                result
            }
            Err(_) => {
                tracing::warn!("⏱️  Shutdown timeout: node did not stop in time");
                Ok(())
            }
        }
    }
}
