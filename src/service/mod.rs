//! Service plugin contract
//!
//! A service consumes inbound peer messages. The protocol manager does not
//! care what a service does with them: it calls `handle_msg` once per message
//! per session, concurrently with every other service, and tears the session
//! down as soon as any service reports an error.

pub mod blockchain;
pub mod txpool;

use crate::network::wire::Msg;
use crate::protocol::message::ErrCode;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub use blockchain::BlockchainService;
pub use txpool::TxPoolService;

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Message broke a protocol rule the service enforces
    #[error("{service}: {code} - {detail}")]
    Protocol {
        service: String,
        code: ErrCode,
        detail: String,
    },

    #[error("{service} failed: {reason}")]
    Failed { service: String, reason: String },

    #[error("{service} failed to start: {reason}")]
    Start { service: String, reason: String },

    #[error("{service} failed to stop: {reason}")]
    Stop { service: String, reason: String },
}

impl ServiceError {
    pub fn code(&self) -> Option<ErrCode> {
        match self {
            ServiceError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Handle a service uses to report a failure for the current session.
///
/// Reporting never blocks: the channel is sized to the service count and a
/// full channel means a failure is already pending, so extra reports are
/// dropped.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    tx: mpsc::Sender<ServiceError>,
}

impl ErrorReporter {
    pub fn new(tx: mpsc::Sender<ServiceError>) -> Self {
        Self { tx }
    }

    /// Create a reporter and its receiving end with room for `capacity` errors
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServiceError>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn report(&self, err: ServiceError) {
        if let Err(e) = self.tx.try_send(err) {
            debug!("Dropped service error report: {}", e);
        }
    }
}

#[async_trait]
pub trait Service: Send + Sync {
    /// Name used in logs and error reports
    fn name(&self) -> &str;

    /// Called once before any message can flow
    async fn start(&self) -> Result<(), ServiceError>;

    /// Called once at manager shutdown; errors are logged, not fatal
    async fn stop(&self) -> Result<(), ServiceError>;

    /// Handle one inbound message. Must not block indefinitely; failures go
    /// through `errors`, never through a return value.
    async fn handle_msg(&self, msg: Msg, errors: ErrorReporter);
}
