use super::{ErrorReporter, Service, ServiceError};
use crate::constants::protocol::STATUS_MSG;
use crate::network::wire::Msg;
use crate::protocol::message::ErrCode;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Chain message consumer.
///
/// Block processing is not implemented; the service only enforces that no
/// status message shows up after the handshake.
#[derive(Debug, Default)]
pub struct BlockchainService {
    running: AtomicBool,
    handled: AtomicU64,
}

impl BlockchainService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled_count(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Service for BlockchainService {
    fn name(&self) -> &str {
        "blockchain"
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.running.store(true, Ordering::Relaxed);
        info!("⛓️  Blockchain service started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.running.store(false, Ordering::Relaxed);
        info!(
            handled = self.handled_count(),
            "⛓️  Blockchain service stopped"
        );
        Ok(())
    }

    async fn handle_msg(&self, msg: Msg, errors: ErrorReporter) {
        self.handled.fetch_add(1, Ordering::Relaxed);

        if msg.code == STATUS_MSG {
            errors.report(ServiceError::Protocol {
                service: self.name().to_string(),
                code: ErrCode::ExtraStatusMsg,
                detail: "uncontrolled status message".to_string(),
            });
            return;
        }

        debug!(code = msg.code, size = msg.size, "Blockchain message");
    }
}
