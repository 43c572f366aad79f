//! Length-prefixed message framing for P2P communication.
//!
//! Frame format: [4-byte length (u32 big-endian)][8-byte code (u64 big-endian)][payload]
//! The length covers code and payload. Maximum frame size: 16MB.

use crate::constants::network::MAX_FRAME_SIZE;
use bytes::Bytes;
use rlp::{Decodable, DecoderError, Encodable};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CODE_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: u32 },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Connection closed")]
    Closed,

    #[error("Identity exchange failed: {0}")]
    Identity(String),

    #[error("Identity exchange timed out")]
    IdentityTimeout,
}

/// A single protocol message as read from or written to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    pub code: u64,
    pub size: u32,
    pub payload: Bytes,
}

impl Msg {
    pub fn new(code: u64, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            code,
            size: payload.len() as u32,
            payload,
        }
    }

    /// RLP-encode `value` into a message with the given code
    pub fn encode<T: Encodable>(code: u64, value: &T) -> Self {
        Self::new(code, rlp::encode(value).freeze())
    }

    /// Decode the payload as an RLP value
    pub fn decode<T: Decodable>(&self) -> Result<T, DecoderError> {
        rlp::decode(&self.payload)
    }
}

/// Write a message as a length-prefixed frame.
pub async fn write_msg<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Msg,
) -> Result<(), TransportError> {
    let frame = serialize_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Pre-serialize a message into a length-prefixed frame.
pub fn serialize_frame(msg: &Msg) -> Result<Vec<u8>, TransportError> {
    let body_len = CODE_LEN + msg.payload.len();
    if body_len > MAX_FRAME_SIZE as usize {
        return Err(TransportError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(4 + body_len);
    frame.extend_from_slice(&(body_len as u32).to_be_bytes());
    frame.extend_from_slice(&msg.code.to_be_bytes());
    frame.extend_from_slice(&msg.payload);
    Ok(frame)
}

/// Read a length-prefixed frame into a message.
/// Returns `TransportError::Closed` on clean EOF at a frame boundary.
pub async fn read_msg<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Msg, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Closed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len as usize,
            max: MAX_FRAME_SIZE,
        });
    }
    if (len as usize) < CODE_LEN {
        return Err(TransportError::MalformedFrame(format!(
            "frame of {} bytes has no message code",
            len
        )));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    let mut code_buf = [0u8; CODE_LEN];
    code_buf.copy_from_slice(&body[..CODE_LEN]);
    let code = u64::from_be_bytes(code_buf);

    let mut body = Bytes::from(body);
    let payload = body.split_off(CODE_LEN);
    Ok(Msg::new(code, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let msg = Msg::new(0x07, vec![1u8, 2, 3, 4]);

        let mut buf = Vec::new();
        write_msg(&mut buf, &msg).await.unwrap();
        assert_eq!(buf.len(), 4 + 8 + 4);

        let mut cursor = std::io::Cursor::new(buf);
        let result = read_msg(&mut cursor).await.unwrap();
        assert_eq!(result.code, 0x07);
        assert_eq!(result.size, 4);
        assert_eq!(&result.payload[..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_eof_returns_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let len = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut cursor = std::io::Cursor::new(len.to_vec());
        let result = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_frame_without_code_rejected() {
        let mut frame = 3u32.to_be_bytes().to_vec();
        frame.extend_from_slice(&[0, 0, 0]);
        let mut cursor = std::io::Cursor::new(frame);
        let result = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(TransportError::MalformedFrame(_))));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_io_error() {
        let mut frame = 20u32.to_be_bytes().to_vec();
        frame.extend_from_slice(&[0u8; 10]);
        let mut cursor = std::io::Cursor::new(frame);
        let result = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
