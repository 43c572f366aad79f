use super::error::RegistryError;
use super::peer::PeerInfo;
use crate::types::PeerId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of active peers keyed by identity.
///
/// Membership check and insert happen under the same shard lock, so two
/// sessions racing with the same identity can never both be admitted.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: DashMap<PeerId, PeerInfo>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Register a peer; fails if its identity is already present
    pub fn register(&self, peer: PeerInfo) -> Result<(), RegistryError> {
        match self.peers.entry(peer.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(peer.id)),
            Entry::Vacant(slot) => {
                debug!("✅ Registered peer: {}", peer.id.short());
                slot.insert(peer);
                Ok(())
            }
        }
    }

    /// Remove a peer. Removing an unknown identity is a no-op.
    pub fn remove(&self, id: &PeerId) {
        if self.peers.remove(id).is_some() {
            debug!("🔌 Unregistered peer: {}", id.short());
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<PeerInfo> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Snapshot of all registered peers, sorted by identity
    pub fn peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }
}

/// Removes the peer from the registry when dropped.
pub(crate) struct Registration {
    peers: Arc<PeerSet>,
    id: PeerId,
}

impl Registration {
    /// Register `info` and return a guard that unregisters it on drop
    pub(crate) fn acquire(peers: Arc<PeerSet>, info: PeerInfo) -> Result<Self, RegistryError> {
        let id = info.id.clone();
        peers.register(info)?;
        Ok(Self { peers, id })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.peers.remove(&self.id);
    }
}
