//! Node lifecycle: wires config, identity, protocol manager and the TCP
//! server together and owns their start/stop ordering.

use crate::config::Config;
use crate::error::AppError;
use crate::network::{NetworkServer, NodeKey, SessionLauncher};
use crate::protocol::{PeerSet, ProtocolManager};
use crate::service::blockchain::BlockchainService;
use crate::service::txpool::TxPoolService;
use crate::service::Service;
use crate::types::PeerId;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};

const ACCEPT_LOOP_DRAIN: Duration = Duration::from_secs(10);
const SESSION_DRAIN: Duration = Duration::from_secs(10);

enum NodeState {
    Idle,
    Starting,
    Running {
        launcher: SessionLauncher,
        listen_addr: SocketAddr,
        accept_task: JoinHandle<()>,
    },
    Stopped,
}

pub struct Node {
    config: Config,
    node_key: Arc<NodeKey>,
    protocol_version: u32,
    manager: Arc<ProtocolManager>,
    shutdown: CancellationToken,
    state: Mutex<NodeState>,
}

impl Node {
    /// Build a node with the default blockchain and txpool services
    pub fn new(config: Config) -> Result<Self, AppError> {
        let services: Vec<Arc<dyn Service>> = vec![
            Arc::new(BlockchainService::new()),
            Arc::new(TxPoolService::new()),
        ];
        Self::with_services(config, services)
    }

    pub fn with_services(config: Config, services: Vec<Arc<dyn Service>>) -> Result<Self, AppError> {
        let params = config.chain_params()?;
        let protocol_version = config.protocol_version()?;
        let node_key = Arc::new(config.node_key()?);

        let span = info_span!(
            "node",
            name = %config.node.name,
            id = %node_key.peer_id().short()
        );
        let manager = Arc::new(ProtocolManager::with_span(params, services, span));

        Ok(Self {
            config,
            node_key,
            protocol_version,
            manager,
            shutdown: CancellationToken::new(),
            state: Mutex::new(NodeState::Idle),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn peer_id(&self) -> PeerId {
        self.node_key.peer_id()
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn manager(&self) -> &Arc<ProtocolManager> {
        &self.manager
    }

    pub fn peers(&self) -> &Arc<PeerSet> {
        self.manager.peers()
    }

    /// Bound listener address, once started
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            NodeState::Running { listen_addr, .. } => Some(*listen_addr),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state.lock(), NodeState::Running { .. })
    }

    /// Start services, bind the listener and dial bootstrap peers
    pub async fn start(&self) -> Result<SocketAddr, AppError> {
        {
            let mut state = self.state.lock();
            match &*state {
                NodeState::Idle => *state = NodeState::Starting,
                NodeState::Stopped => {
                    return Err(AppError::Network("node already stopped".to_string()))
                }
                _ => return Err(AppError::Network("node already running".to_string())),
            }
        }

        match self.bring_up().await {
            Ok(addr) => Ok(addr),
            Err(e) => {
                let mut state = self.state.lock();
                if matches!(*state, NodeState::Starting) {
                    *state = NodeState::Idle;
                }
                Err(e)
            }
        }
    }

    async fn bring_up(&self) -> Result<SocketAddr, AppError> {
        self.manager.start().await?;

        let launcher = SessionLauncher::new(
            self.manager.clone(),
            self.node_key.clone(),
            self.protocol_version,
            self.config.network.max_peers,
            self.config.network.dial_timeout(),
            self.shutdown.child_token(),
        );
        let bind_addr = &self.config.network.listen_address;
        let server = match NetworkServer::bind(bind_addr, launcher.clone()).await {
            Ok(server) => server,
            Err(e) => {
                self.manager.stop().await;
                return Err(AppError::Network(format!(
                    "failed to bind {}: {}",
                    bind_addr, e
                )));
            }
        };
        let listen_addr = match server.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.manager.stop().await;
                return Err(e.into());
            }
        };
        let accept_task = tokio::spawn(server.run());

        let raced = {
            let mut state = self.state.lock();
            // stop() raced with start(); the cancelled token ends the accept loop
            if !matches!(*state, NodeState::Stopped) {
                *state = NodeState::Running {
                    launcher: launcher.clone(),
                    listen_addr,
                    accept_task,
                };
                None
            } else {
                Some(accept_task)
            }
        };
        if let Some(accept_task) = raced {
            // stop() saw Starting and left the services to us
            let _ = accept_task.await;
            launcher.drain(SESSION_DRAIN).await;
            self.manager.stop().await;
            return Err(AppError::Network("node stopped during start".to_string()));
        }
        info!(
            "✅ Node {} started on {} (id {})",
            self.config.node.name,
            listen_addr,
            self.peer_id().short()
        );

        for peer in &self.config.network.bootstrap_peers {
            match peer.parse::<SocketAddr>() {
                Ok(addr) => {
                    self.add_peer(addr)?;
                }
                Err(e) => warn!("Skipping bootstrap peer {}: {}", peer, e),
            }
        }

        Ok(listen_addr)
    }

    /// Dial `addr` in the background; fails only if the node is not running
    pub fn add_peer(&self, addr: SocketAddr) -> Result<(), AppError> {
        match &*self.state.lock() {
            NodeState::Running { launcher, .. } => {
                launcher.spawn_dial(addr);
                Ok(())
            }
            _ => Err(AppError::Network("node not running".to_string())),
        }
    }

    /// Stop accepting, end all sessions and stop every service
    pub async fn stop(&self) -> Result<(), AppError> {
        let previous = std::mem::replace(&mut *self.state.lock(), NodeState::Stopped);
        self.shutdown.cancel();

        match previous {
            NodeState::Running {
                launcher,
                accept_task,
                ..
            } => {
                if tokio::time::timeout(ACCEPT_LOOP_DRAIN, accept_task)
                    .await
                    .is_err()
                {
                    warn!("⏱️  Accept loop did not stop in time");
                }
                if !launcher.drain(SESSION_DRAIN).await {
                    warn!("⏱️  Sessions did not end in time");
                }
                let failures = self.manager.stop().await;
                if !failures.is_empty() {
                    error!("{} service(s) failed to stop cleanly", failures.len());
                }
                info!("🛑 Node {} stopped", self.config.node.name);
            }
            NodeState::Stopped => {}
            NodeState::Idle | NodeState::Starting => {
                info!("🛑 Node {} stopped before start", self.config.node.name);
            }
        }
        Ok(())
    }

    /// Resolves once the node has been stopped
    pub async fn wait(&self) {
        self.shutdown.cancelled().await;
    }
}
