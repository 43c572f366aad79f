use super::error::HandshakeError;
use super::message::{ErrCode, StatusData};
use crate::constants::protocol::{HANDSHAKE_TIMEOUT, PROTOCOL_MAX_MSG_SIZE, STATUS_MSG};
use crate::network::transport::MsgReadWriter;
use crate::network::wire::{Msg, TransportError};
use crate::types::{ConnectionDirection, PeerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of a peer kept by the registry and returned by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub remote_addr: Option<SocketAddr>,
    pub direction: ConnectionDirection,
    pub protocol_version: u32,
    pub connected_at: DateTime<Utc>,
}

/// One connected remote node: identity, transport and negotiated version.
pub struct Peer {
    id: PeerId,
    rw: Arc<dyn MsgReadWriter>,
    version: u32,
    remote_addr: Option<SocketAddr>,
    direction: ConnectionDirection,
    connected_at: DateTime<Utc>,
}

impl Peer {
    pub fn new(
        id: PeerId,
        rw: Arc<dyn MsgReadWriter>,
        version: u32,
        direction: ConnectionDirection,
    ) -> Self {
        Self {
            id,
            rw,
            version,
            remote_addr: None,
            direction,
            connected_at: Utc::now(),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id.clone(),
            remote_addr: self.remote_addr,
            direction: self.direction,
            protocol_version: self.version,
            connected_at: self.connected_at,
        }
    }

    pub async fn read_msg(&self) -> Result<Msg, TransportError> {
        self.rw.read_msg().await
    }

    pub async fn write_msg(&self, msg: Msg) -> Result<(), TransportError> {
        self.rw.write_msg(msg).await
    }

    /// Run the status handshake and return the negotiated version.
    ///
    /// `local` is sent as-is; the remote status is checked against its
    /// network id, chain id and genesis, and against this peer's version.
    /// Send and receive run concurrently and share one timeout.
    pub async fn handshake(&self, local: &StatusData) -> Result<u32, HandshakeError> {
        let send = async {
            self.rw
                .write_msg(Msg::encode(STATUS_MSG, local))
                .await
                .map_err(HandshakeError::from)
        };
        let receive = self.read_status(local);

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, async { tokio::try_join!(send, receive) })
            .await
        {
            Ok(Ok(((), status))) => {
                debug!(
                    peer = %self.id.short(),
                    version = status.protocol_version,
                    "Status exchanged"
                );
                Ok(self.version)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HandshakeError::ReadTimeout),
        }
    }

    async fn read_status(&self, local: &StatusData) -> Result<StatusData, HandshakeError> {
        let msg = self.rw.read_msg().await?;
        validate_status(&msg, local, self.version)
    }
}

/// Check a received status message against the local status, in protocol order.
pub fn validate_status(
    msg: &Msg,
    local: &StatusData,
    version: u32,
) -> Result<StatusData, HandshakeError> {
    if msg.code != STATUS_MSG {
        return Err(HandshakeError::protocol(
            ErrCode::NoStatusMsg,
            format!("first msg has code {:x} (!= {:x})", msg.code, STATUS_MSG),
        ));
    }
    if msg.size > PROTOCOL_MAX_MSG_SIZE {
        return Err(HandshakeError::protocol(
            ErrCode::MsgTooLarge,
            format!("{} > {}", msg.size, PROTOCOL_MAX_MSG_SIZE),
        ));
    }
    let status: StatusData = msg.decode().map_err(|e| {
        HandshakeError::protocol(ErrCode::Decode, format!("msg code {}: {}", msg.code, e))
    })?;
    if status.genesis_block != local.genesis_block {
        return Err(HandshakeError::protocol(
            ErrCode::GenesisBlockMismatch,
            format!(
                "{} (!= {})",
                hex::encode(&status.genesis_block[..8]),
                hex::encode(&local.genesis_block[..8])
            ),
        ));
    }
    if status.network_id != local.network_id {
        return Err(HandshakeError::protocol(
            ErrCode::NetworkIdMismatch,
            format!("{} (!= {})", status.network_id, local.network_id),
        ));
    }
    if status.chain_id != local.chain_id {
        return Err(HandshakeError::protocol(
            ErrCode::ChainIDMismatch,
            format!("{} (!= {})", status.chain_id, local.chain_id),
        ));
    }
    if status.protocol_version != version {
        return Err(HandshakeError::protocol(
            ErrCode::ProtocolVersionMismatch,
            format!("{} (!= {})", status.protocol_version, version),
        ));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn local() -> StatusData {
        StatusData {
            protocol_version: 65,
            network_id: 1000,
            td: BigUint::from(1u32),
            current_block: [0u8; 32],
            genesis_block: [0xAA; 32],
            chain_id: BigUint::from(8217u32),
        }
    }

    fn code_of(msg: &Msg) -> Option<ErrCode> {
        validate_status(msg, &local(), 65).err().and_then(|e| e.code())
    }

    #[test]
    fn test_matching_status_accepted() {
        let msg = Msg::encode(STATUS_MSG, &local());
        assert_eq!(validate_status(&msg, &local(), 65).unwrap(), local());
    }

    #[test]
    fn test_placeholders_not_validated() {
        let mut remote = local();
        remote.td = BigUint::from(999u32);
        remote.current_block = [0x55; 32];
        assert!(validate_status(&Msg::encode(STATUS_MSG, &remote), &local(), 65).is_ok());
    }

    #[test]
    fn test_wrong_code_checked_first() {
        // Wrong code and garbage payload: the code check wins
        let msg = Msg::new(0x03, vec![0xFFu8; 4]);
        assert_eq!(code_of(&msg), Some(ErrCode::NoStatusMsg));
    }

    #[test]
    fn test_oversized_before_decode() {
        let msg = Msg::new(STATUS_MSG, vec![0u8; PROTOCOL_MAX_MSG_SIZE as usize + 1]);
        assert_eq!(code_of(&msg), Some(ErrCode::MsgTooLarge));
    }

    #[test]
    fn test_garbage_payload_is_decode_error() {
        let msg = Msg::new(STATUS_MSG, vec![0xC3u8, 0x01]);
        assert_eq!(code_of(&msg), Some(ErrCode::Decode));
    }

    #[test]
    fn test_genesis_checked_before_other_fields() {
        let mut remote = local();
        remote.genesis_block = [0xBB; 32];
        remote.network_id = 1;
        remote.chain_id = BigUint::from(1u32);
        remote.protocol_version = 62;
        let msg = Msg::encode(STATUS_MSG, &remote);
        assert_eq!(code_of(&msg), Some(ErrCode::GenesisBlockMismatch));
    }

    #[test]
    fn test_network_then_chain_then_version() {
        let mut remote = local();
        remote.network_id = 1001;
        remote.chain_id = BigUint::from(1u32);
        assert_eq!(
            code_of(&Msg::encode(STATUS_MSG, &remote)),
            Some(ErrCode::NetworkIdMismatch)
        );

        let mut remote = local();
        remote.chain_id = BigUint::from(8218u32);
        remote.protocol_version = 64;
        assert_eq!(
            code_of(&Msg::encode(STATUS_MSG, &remote)),
            Some(ErrCode::ChainIDMismatch)
        );

        let mut remote = local();
        remote.protocol_version = 64;
        assert_eq!(
            code_of(&Msg::encode(STATUS_MSG, &remote)),
            Some(ErrCode::ProtocolVersionMismatch)
        );
    }
}
