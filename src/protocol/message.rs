use crate::types::Hash256;
use num_bigint::BigUint;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use std::fmt;

const STATUS_FIELDS: usize = 6;

/// Stable protocol error codes. The numeric values match the klay protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrCode {
    MsgTooLarge = 0,
    Decode = 1,
    InvalidMsgCode = 2,
    ProtocolVersionMismatch = 3,
    NetworkIdMismatch = 4,
    GenesisBlockMismatch = 5,
    ChainIDMismatch = 6,
    NoStatusMsg = 7,
    ExtraStatusMsg = 8,
    SuspendedPeer = 9,
    UnexpectedTxType = 10,
    FailedToGetStateDB = 11,
    UnsupportedEnginePolicy = 12,
}

impl ErrCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrCode::MsgTooLarge => "Message too long",
            ErrCode::Decode => "Invalid message",
            ErrCode::InvalidMsgCode => "Invalid message code",
            ErrCode::ProtocolVersionMismatch => "Protocol version mismatch",
            ErrCode::NetworkIdMismatch => "NetworkId mismatch",
            ErrCode::GenesisBlockMismatch => "Genesis block mismatch",
            ErrCode::ChainIDMismatch => "ChainID mismatch",
            ErrCode::NoStatusMsg => "No status message",
            ErrCode::ExtraStatusMsg => "Extra status message",
            ErrCode::SuspendedPeer => "Suspended peer",
            ErrCode::UnexpectedTxType => "Unexpected tx type",
            ErrCode::FailedToGetStateDB => "Failed to get stateDB",
            ErrCode::UnsupportedEnginePolicy => "Unsupported engine or policy",
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network packet for the status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusData {
    pub protocol_version: u32,
    pub network_id: u64,
    /// Transmitted for compatibility, not validated
    pub td: BigUint,
    /// Transmitted for compatibility, not validated
    pub current_block: Hash256,
    pub genesis_block: Hash256,
    pub chain_id: BigUint,
}

/// Minimal big-endian bytes; zero encodes as the empty string.
fn biguint_bytes(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

fn decode_biguint(rlp: &Rlp, index: usize) -> Result<BigUint, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    if bytes.first() == Some(&0) {
        return Err(DecoderError::Custom("leading zero bytes in integer"));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

fn decode_hash(rlp: &Rlp, index: usize) -> Result<Hash256, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    bytes
        .try_into()
        .map_err(|_| DecoderError::Custom("hash must be 32 bytes"))
}

impl Encodable for StatusData {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(STATUS_FIELDS);
        s.append(&self.protocol_version);
        s.append(&self.network_id);
        s.append(&biguint_bytes(&self.td));
        s.append(&self.current_block.to_vec());
        s.append(&self.genesis_block.to_vec());
        s.append(&biguint_bytes(&self.chain_id));
    }
}

impl Decodable for StatusData {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        if rlp.item_count()? != STATUS_FIELDS {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            protocol_version: rlp.val_at(0)?,
            network_id: rlp.val_at(1)?,
            td: decode_biguint(rlp, 2)?,
            current_block: decode_hash(rlp, 3)?,
            genesis_block: decode_hash(rlp, 4)?,
            chain_id: decode_biguint(rlp, 5)?,
        })
    }
}
