//! Session-level error types
//!
//! Every way a peer session can end surfaces as a `SessionError` returned
//! from `ProtocolManager::handle`.

use super::message::ErrCode;
use crate::network::wire::TransportError;
use crate::service::ServiceError;
use crate::types::PeerId;
use thiserror::Error;

/// Errors that abort the status handshake
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Remote broke a protocol rule; `code` tells which one
    #[error("{code} - {detail}")]
    Protocol { code: ErrCode, detail: String },

    /// Send and receive did not both finish within the handshake timeout
    #[error("read timeout")]
    ReadTimeout,

    #[error("transport error during handshake: {0}")]
    Transport(#[from] TransportError),
}

impl HandshakeError {
    pub(crate) fn protocol(code: ErrCode, detail: impl Into<String>) -> Self {
        HandshakeError::Protocol {
            code,
            detail: detail.into(),
        }
    }

    /// Protocol error code, if the failure was a protocol violation
    pub fn code(&self) -> Option<ErrCode> {
        match self {
            HandshakeError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("peer is already registered: {0}")]
    AlreadyRegistered(PeerId),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Message dispatcher stopped unexpectedly")]
    DispatcherClosed,
}

impl SessionError {
    /// Protocol error code carried by this failure, if any
    pub fn code(&self) -> Option<ErrCode> {
        match self {
            SessionError::Handshake(e) => e.code(),
            SessionError::Service(e) => e.code(),
            _ => None,
        }
    }
}
