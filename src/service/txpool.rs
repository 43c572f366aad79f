use super::{ErrorReporter, Service, ServiceError};
use crate::network::wire::Msg;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Transaction message consumer. Pool logic is not implemented.
#[derive(Debug, Default)]
pub struct TxPoolService {
    handled: AtomicU64,
}

impl TxPoolService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled_count(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Service for TxPoolService {
    fn name(&self) -> &str {
        "txpool"
    }

    async fn start(&self) -> Result<(), ServiceError> {
        info!("💸 TxPool service started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        info!(handled = self.handled_count(), "💸 TxPool service stopped");
        Ok(())
    }

    async fn handle_msg(&self, msg: Msg, _errors: ErrorReporter) {
        self.handled.fetch_add(1, Ordering::Relaxed);
        debug!(code = msg.code, size = msg.size, "TxPool message");
    }
}
