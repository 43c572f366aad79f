//! Protocol manager: drives one session per connected peer.
//!
//! Session flow: status handshake → registry admission → read loop. Every
//! message read from the peer is handed to a per-session dispatcher task
//! that runs all services on it concurrently. The first error from the
//! transport or from any service ends the session, and the registration
//! guard removes the peer on the way out.

use super::error::SessionError;
use super::message::StatusData;
use super::peer::Peer;
use super::peer_set::{PeerSet, Registration};
use crate::constants::protocol::{
    APP_PROTOCOL_LENGTH, APP_PROTOCOL_NAME, APP_PROTOCOL_VERSION, PROTOCOL_LENGTHS,
    PROTOCOL_NAME, PROTOCOL_VERSIONS,
};
use crate::network::wire::Msg;
use crate::service::{ErrorReporter, Service, ServiceError};
use crate::types::Hash256;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Chain parameters the handshake checks remote peers against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub network_id: u64,
    pub chain_id: BigUint,
    pub genesis: Hash256,
    /// Sent in the status message, never validated
    pub td: BigUint,
    /// Sent in the status message, never validated
    pub head: Hash256,
}

impl ChainParams {
    pub fn new(network_id: u64, chain_id: BigUint, genesis: Hash256) -> Self {
        Self {
            network_id,
            chain_id,
            genesis,
            td: BigUint::default(),
            head: genesis,
        }
    }
}

/// Capability descriptor advertised for this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub version: u32,
    pub length: u64,
}

/// A message on its way to the dispatcher, with a completion signal
struct Dispatch {
    msg: Msg,
    done: oneshot::Sender<()>,
}

pub struct ProtocolManager {
    params: ChainParams,
    peers: Arc<PeerSet>,
    services: Vec<Arc<dyn Service>>,
    span: Span,
}

impl ProtocolManager {
    pub fn new(params: ChainParams, services: Vec<Arc<dyn Service>>) -> Self {
        let span = info_span!("protocol", network_id = params.network_id);
        Self::with_span(params, services, span)
    }

    /// Build a manager whose sessions log under `span`
    pub fn with_span(params: ChainParams, services: Vec<Arc<dyn Service>>, span: Span) -> Self {
        Self {
            params,
            peers: Arc::new(PeerSet::new()),
            services,
            span,
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Registry of currently active peers
    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        let mut protocols = vec![Protocol {
            name: APP_PROTOCOL_NAME.to_string(),
            version: APP_PROTOCOL_VERSION,
            length: APP_PROTOCOL_LENGTH,
        }];
        protocols.extend(
            PROTOCOL_VERSIONS
                .iter()
                .zip(PROTOCOL_LENGTHS.iter())
                .map(|(version, length)| Protocol {
                    name: PROTOCOL_NAME.to_string(),
                    version: *version,
                    length: *length,
                }),
        );
        protocols
    }

    /// Status message this node sends to a peer speaking `version`
    pub fn local_status(&self, version: u32) -> StatusData {
        StatusData {
            protocol_version: version,
            network_id: self.params.network_id,
            td: self.params.td.clone(),
            current_block: self.params.head,
            genesis_block: self.params.genesis,
            chain_id: self.params.chain_id.clone(),
        }
    }

    /// Start every service, stopping at the first failure
    pub async fn start(&self) -> Result<(), ServiceError> {
        for service in &self.services {
            service.start().await?;
        }
        info!(
            parent: &self.span,
            services = self.services.len(),
            "🚀 Protocol manager started"
        );
        Ok(())
    }

    /// Stop every service. Failures are logged and returned, never fatal.
    pub async fn stop(&self) -> Vec<ServiceError> {
        let mut failures = Vec::new();
        for service in &self.services {
            if let Err(e) = service.stop().await {
                warn!(parent: &self.span, "Failed to stop service {}: {}", service.name(), e);
                failures.push(e);
            }
        }
        info!(parent: &self.span, "🛑 Protocol manager stopped");
        failures
    }

    /// Run a session for `peer` until it ends; returns why it ended.
    pub async fn handle(&self, peer: Peer) -> Result<(), SessionError> {
        let span = info_span!(
            parent: &self.span,
            "session",
            peer = %peer.id().short(),
            addr = ?peer.remote_addr()
        );
        let result = self.run_session(peer).instrument(span.clone()).await;
        match &result {
            Ok(()) => info!(parent: &span, "🔌 Session closed"),
            Err(SessionError::Transport(e)) => info!(parent: &span, "🔌 Session ended: {}", e),
            Err(e) => warn!(parent: &span, "❌ Session aborted: {}", e),
        }
        result
    }

    async fn run_session(&self, peer: Peer) -> Result<(), SessionError> {
        let local = self.local_status(peer.version());
        let version = peer.handshake(&local).await?;
        debug!(version, "🤝 Handshake complete");

        let _registration = Registration::acquire(self.peers.clone(), peer.info())?;
        info!(active = self.peers.len(), "✅ Peer registered");

        let (reporter, mut errors) = ErrorReporter::channel(self.services.len());
        let (msg_tx, msg_rx) = mpsc::channel::<Dispatch>(1);
        let dispatcher = tokio::spawn(
            distribute_msg_to_services(self.services.clone(), msg_rx, reporter).in_current_span(),
        );

        let result = read_loop(&peer, &msg_tx, &mut errors).await;

        drop(msg_tx);
        dispatcher.abort();
        result
    }
}

/// Read messages and hand each one to the dispatcher, one at a time.
///
/// The next message is only read once every service has finished with the
/// previous one, so a service error for message M always ends the session
/// before message M+1 is pulled off the transport.
async fn read_loop(
    peer: &Peer,
    msg_tx: &mpsc::Sender<Dispatch>,
    errors: &mut mpsc::Receiver<ServiceError>,
) -> Result<(), SessionError> {
    loop {
        let msg = tokio::select! {
            biased;
            Some(err) = errors.recv() => return Err(err.into()),
            read = peer.read_msg() => read?,
        };

        let (done_tx, done_rx) = oneshot::channel();
        tokio::select! {
            biased;
            Some(err) = errors.recv() => return Err(err.into()),
            sent = msg_tx.send(Dispatch { msg, done: done_tx }) => {
                if sent.is_err() {
                    return Err(SessionError::DispatcherClosed);
                }
            }
        }

        tokio::select! {
            biased;
            Some(err) = errors.recv() => return Err(err.into()),
            done = done_rx => {
                if done.is_err() {
                    return Err(SessionError::DispatcherClosed);
                }
            }
        }
    }
}

/// Fan each message out to all services concurrently, then signal completion.
async fn distribute_msg_to_services(
    services: Vec<Arc<dyn Service>>,
    mut msg_rx: mpsc::Receiver<Dispatch>,
    errors: ErrorReporter,
) {
    while let Some(Dispatch { msg, done }) = msg_rx.recv().await {
        let mut tasks = JoinSet::new();
        for service in &services {
            let service = service.clone();
            let msg = msg.clone();
            let errors = errors.clone();
            tasks.spawn(
                async move {
                    service.handle_msg(msg, errors).await;
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Service task failed: {}", e);
                errors.report(ServiceError::Failed {
                    service: "dispatcher".to_string(),
                    reason: format!("service task failed: {}", e),
                });
            }
        }

        let _ = done.send(());
    }
}
