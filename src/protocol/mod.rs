pub mod error;
pub mod manager;
pub mod message;
pub mod peer;
pub mod peer_set;

pub use error::{HandshakeError, RegistryError, SessionError};
pub use manager::{ChainParams, Protocol, ProtocolManager};
pub use message::{ErrCode, StatusData};
pub use peer::{Peer, PeerInfo};
pub use peer_set::PeerSet;
