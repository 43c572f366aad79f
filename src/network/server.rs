//! TCP front end: accepts and dials connections, authenticates them and
//! hands each one to the protocol manager as a session.

use super::identity::{exchange_identity, NodeKey};
use super::transport::TcpTransport;
use super::wire::TransportError;
use crate::protocol::{Peer, ProtocolManager};
use crate::types::{ConnectionDirection, PeerId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Turns raw TCP streams into protocol sessions. Cheap to clone.
///
/// Every connection holds one of `max_peers` slots from before the identity
/// exchange until its session ends, so simultaneous connects cannot push
/// the peer count past the limit.
#[derive(Clone)]
pub struct SessionLauncher {
    manager: Arc<ProtocolManager>,
    node_key: Arc<NodeKey>,
    protocol_version: u32,
    max_peers: usize,
    slots: Arc<Semaphore>,
    dial_timeout: Duration,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl SessionLauncher {
    pub fn new(
        manager: Arc<ProtocolManager>,
        node_key: Arc<NodeKey>,
        protocol_version: u32,
        max_peers: usize,
        dial_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            node_key,
            protocol_version,
            max_peers,
            slots: Arc::new(Semaphore::new(max_peers)),
            dial_timeout,
            cancel,
            tasks: TaskTracker::new(),
        }
    }

    /// Connection slots not held by any session
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    fn reserve_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().try_acquire_owned().ok()
    }

    /// Dial `addr` on a tracked background task
    pub fn spawn_dial(&self, addr: SocketAddr) {
        let launcher = self.clone();
        self.tasks.spawn(async move {
            if let Err(e) = launcher.dial(addr).await {
                warn!("❌ Failed to connect to {}: {}", addr, e);
            }
        });
    }

    /// Connect to `addr`, authenticate and start a session in the background.
    pub async fn dial(&self, addr: SocketAddr) -> Result<PeerId, std::io::Error> {
        let slot = self.reserve_slot().ok_or_else(|| {
            std::io::Error::other(format!("peer limit reached ({})", self.max_peers))
        })?;

        let stream = match tokio::time::timeout(self.dial_timeout, TcpStream::connect(addr)).await
        {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("dial {} timed out", addr),
                ))
            }
        };
        info!("📤 Connected to peer {}", addr);
        self.launch(stream, addr, ConnectionDirection::Outbound, slot)
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    async fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        let Some(slot) = self.reserve_slot() else {
            warn!(
                "🚫 Rejecting {}: peer limit reached ({})",
                addr, self.max_peers
            );
            return;
        };
        if let Err(e) = self
            .launch(stream, addr, ConnectionDirection::Inbound, slot)
            .await
        {
            warn!("❌ Connection from {} rejected: {}", addr, e);
        }
    }

    async fn launch(
        &self,
        mut stream: TcpStream,
        addr: SocketAddr,
        direction: ConnectionDirection,
        slot: OwnedSemaphorePermit,
    ) -> Result<PeerId, TransportError> {
        let _ = stream.set_nodelay(true);
        let id = exchange_identity(&mut stream, &self.node_key).await?;
        debug!(peer = %id.short(), %addr, %direction, "Identity verified");

        let peer = Peer::new(
            id.clone(),
            Arc::new(TcpTransport::from_tcp(stream)),
            self.protocol_version,
            direction,
        )
        .with_remote_addr(addr);

        let manager = self.manager.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let _slot = slot;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%addr, "Session cancelled by shutdown");
                }
                _ = manager.handle(peer) => {}
            }
        });
        Ok(id)
    }

    /// Wait for every connection and session task to finish.
    /// Returns false if some were still running after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }
}

pub struct NetworkServer {
    listener: TcpListener,
    launcher: SessionLauncher,
}

impl NetworkServer {
    pub async fn bind(bind_addr: &str, launcher: SessionLauncher) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { listener, launcher })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn launcher(&self) -> &SessionLauncher {
        &self.launcher
    }

    /// Accept connections until the launcher's token is cancelled
    pub async fn run(self) {
        let cancel = self.launcher.cancel.clone();
        info!(
            "🌐 Listening for peers on {}",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string())
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("🛑 Accept loop stopped");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("🔌 New peer connection from: {}", addr);
                        let launcher = self.launcher.clone();
                        self.launcher
                            .tasks
                            .spawn(async move { launcher.accept(stream, addr).await });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }
}
