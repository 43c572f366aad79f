use serde::{Deserialize, Serialize};
use std::fmt;

pub type Hash256 = [u8; 32];

/// Unique peer identity: lowercase hex of the peer's ed25519 verifying key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn from_public_key(key: &[u8; 32]) -> Self {
        Self(hex::encode(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex chars, enough to tell peers apart in logs
    pub fn short(&self) -> &str {
        self.0.get(..16).unwrap_or(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of the network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    Inbound,
    Outbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDirection::Inbound => write!(f, "Inbound"),
            ConnectionDirection::Outbound => write!(f, "Outbound"),
        }
    }
}

/// Parse a 0x-prefixed (or bare) 64 char hex string into a hash
pub fn parse_hash(s: &str) -> Result<Hash256, String> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| format!("invalid hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash() {
        let h = parse_hash(&format!("0x{}", "aa".repeat(32))).unwrap();
        assert_eq!(h, [0xAA; 32]);
        assert!(parse_hash("0x1234").is_err());
        assert!(parse_hash("zz").is_err());
    }

    #[test]
    fn test_peer_id_short() {
        let id = PeerId::from_public_key(&[0xAB; 32]);
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id.short(), "abababababababab");
    }
}
