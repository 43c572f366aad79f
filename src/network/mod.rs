pub mod identity;
pub mod server;
pub mod transport;
pub mod wire;

pub use identity::NodeKey;
pub use server::{NetworkServer, SessionLauncher};
pub use transport::{MsgReadWriter, StreamTransport, TcpTransport};
pub use wire::{Msg, TransportError};
