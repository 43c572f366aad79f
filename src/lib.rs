//! Guardian peer-session layer.
//!
//! Accepts peer connections, runs the klay status handshake, keeps the
//! active-peer registry and fans inbound messages out to pluggable services.

pub mod config;
pub mod constants;
pub mod error;
pub mod network;
pub mod node;
pub mod protocol;
pub mod rpc;
pub mod service;
pub mod shutdown;
pub mod types;

pub use error::AppError;
pub use node::Node;
pub use protocol::{Peer, PeerSet, ProtocolManager};
pub use service::Service;
