//! Node identity and the connection-level identity exchange.
//!
//! Both sides send `[pubkey 32][nonce 32]`, then a signature over
//! `IDENTITY_DOMAIN || remote_nonce || own_pubkey`. Each side verifies the
//! signature it receives against the announced key, which binds the key to
//! this connection. The resulting `PeerId` is what the registry keys on.

use super::wire::TransportError;
use crate::constants::network::IDENTITY_TIMEOUT;
use crate::types::PeerId;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const IDENTITY_DOMAIN: &[u8] = b"guardian-identity";

/// Long-lived ed25519 key of this node
#[derive(Clone)]
pub struct NodeKey {
    signing_key: SigningKey,
}

impl NodeKey {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Build a key from a hex-encoded 32-byte seed
    pub fn from_hex(hex_seed: &str) -> Result<Self, String> {
        let trimmed = hex_seed.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed).map_err(|e| format!("invalid node key hex: {}", e))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("node key must be 32 bytes, got {}", b.len()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Hex-encoded seed, the form `from_hex` and the config file accept
    pub fn to_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key().to_bytes())
    }

    fn sign(&self, data: &[u8]) -> Signature {
        self.signing_key.sign(data)
    }
}

impl std::fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKey")
            .field("peer_id", &self.peer_id())
            .finish()
    }
}

fn signing_payload(nonce: &[u8; 32], pubkey: &[u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(IDENTITY_DOMAIN.len() + 64);
    data.extend_from_slice(IDENTITY_DOMAIN);
    data.extend_from_slice(nonce);
    data.extend_from_slice(pubkey);
    data
}

/// Run the identity exchange on a fresh stream, bounded by `IDENTITY_TIMEOUT`.
pub async fn exchange_identity<S>(stream: &mut S, key: &NodeKey) -> Result<PeerId, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(IDENTITY_TIMEOUT, run_exchange(stream, key)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::IdentityTimeout),
    }
}

async fn run_exchange<S>(stream: &mut S, key: &NodeKey) -> Result<PeerId, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let own_pubkey = key.public_key().to_bytes();
    let mut own_nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut own_nonce);

    let mut hello = [0u8; 64];
    hello[..32].copy_from_slice(&own_pubkey);
    hello[32..].copy_from_slice(&own_nonce);
    stream.write_all(&hello).await?;
    stream.flush().await?;

    let mut remote_hello = [0u8; 64];
    stream.read_exact(&mut remote_hello).await?;
    let mut remote_pubkey = [0u8; 32];
    let mut remote_nonce = [0u8; 32];
    remote_pubkey.copy_from_slice(&remote_hello[..32]);
    remote_nonce.copy_from_slice(&remote_hello[32..]);

    if remote_pubkey == own_pubkey {
        return Err(TransportError::Identity("connected to self".to_string()));
    }
    let remote_key = VerifyingKey::from_bytes(&remote_pubkey)
        .map_err(|e| TransportError::Identity(format!("invalid public key: {}", e)))?;

    let signature = key.sign(&signing_payload(&remote_nonce, &own_pubkey));
    stream.write_all(&signature.to_bytes()).await?;
    stream.flush().await?;

    let mut remote_sig = [0u8; 64];
    stream.read_exact(&mut remote_sig).await?;
    let remote_sig = Signature::from_bytes(&remote_sig);

    remote_key
        .verify(&signing_payload(&own_nonce, &remote_pubkey), &remote_sig)
        .map_err(|_| TransportError::Identity("invalid identity signature".to_string()))?;

    Ok(PeerId::from_public_key(&remote_pubkey))
}
