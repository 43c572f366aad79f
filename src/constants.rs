//! Global constants for the guardian node
//!
//! Centralizes protocol numbers and timeouts so the handshake, the framing
//! layer and the server agree on them.

/// klay protocol constants
pub mod protocol {
    use std::time::Duration;

    /// Official short name of the protocol used during capability negotiation
    pub const PROTOCOL_NAME: &str = "klay";

    /// Name the protocol is exposed under by this application
    pub const APP_PROTOCOL_NAME: &str = "guardian";
    pub const APP_PROTOCOL_VERSION: u32 = 1;
    pub const APP_PROTOCOL_LENGTH: u64 = 23;

    pub const KLAY62: u32 = 62;
    pub const KLAY63: u32 = 63;
    pub const KLAY64: u32 = 64;
    pub const KLAY65: u32 = 65;

    /// Supported versions, highest preferred first
    pub const PROTOCOL_VERSIONS: [u32; 4] = [KLAY65, KLAY64, KLAY63, KLAY62];

    /// Number of implemented messages for each entry of PROTOCOL_VERSIONS
    pub const PROTOCOL_LENGTHS: [u64; 4] = [21, 19, 17, 8];

    /// Maximum cap on the size of a protocol message (12 MiB)
    pub const PROTOCOL_MAX_MSG_SIZE: u32 = 12 * 1024 * 1024;

    /// Status message code, must be the first message of every session
    pub const STATUS_MSG: u64 = 0x00;

    /// Bounds the send and the receive of the status exchange together
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Message count ceiling for a supported version, `None` if unsupported
    pub fn protocol_length(version: u32) -> Option<u64> {
        PROTOCOL_VERSIONS
            .iter()
            .position(|v| *v == version)
            .map(|i| PROTOCOL_LENGTHS[i])
    }
}

/// Network transport constants
pub mod network {
    use std::time::Duration;

    /// Largest frame the transport accepts (16 MiB). Must stay above the
    /// protocol ceiling so oversized status messages reach the handshake.
    pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

    /// Identity exchange must finish within this window
    pub const IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default timeout for outbound TCP connects
    pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 10;

    pub const DEFAULT_P2P_PORT: u16 = 32323;

    pub const DEFAULT_MAX_PEERS: usize = 50;

    /// Read buffer per connection (1 MB)
    pub const READ_BUFFER_SIZE: usize = 1024 * 1024;
}
