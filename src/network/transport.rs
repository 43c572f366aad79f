//! Message transport over a split byte stream.
//!
//! Reader and writer halves sit behind separate locks so one task can block
//! on `read_msg` while another writes. The handshake relies on this to send
//! and receive its status message at the same time.

use super::wire::{self, Msg, TransportError};
use crate::constants::network::READ_BUFFER_SIZE;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Per-peer message reader/writer consumed by the protocol layer.
#[async_trait]
pub trait MsgReadWriter: Send + Sync {
    async fn read_msg(&self) -> Result<Msg, TransportError>;

    async fn write_msg(&self, msg: Msg) -> Result<(), TransportError>;
}

pub struct StreamTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<BufWriter<W>>,
}

pub type TcpTransport = StreamTransport<OwnedReadHalf, OwnedWriteHalf>;

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader)),
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }
}

impl TcpTransport {
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half)
    }
}

#[async_trait]
impl<R, W> MsgReadWriter for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_msg(&self) -> Result<Msg, TransportError> {
        let mut reader = self.reader.lock().await;
        wire::read_msg(&mut *reader).await
    }

    async fn write_msg(&self, msg: Msg) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        wire::write_msg(&mut *writer, &msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split};

    #[tokio::test]
    async fn test_duplex_transport_exchanges_messages() {
        let (a, b) = duplex(64 * 1024);
        let (ar, aw) = split(a);
        let (br, bw) = split(b);
        let left = StreamTransport::new(ar, aw);
        let right = StreamTransport::new(br, bw);

        left.write_msg(Msg::new(3, vec![9u8; 10])).await.unwrap();
        let got = right.read_msg().await.unwrap();
        assert_eq!(got.code, 3);
        assert_eq!(got.size, 10);

        drop(left);
        assert!(matches!(
            right.read_msg().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_read_and_write() {
        let (a, b) = duplex(64 * 1024);
        let (ar, aw) = split(a);
        let (br, bw) = split(b);
        let left = StreamTransport::new(ar, aw);
        let right = StreamTransport::new(br, bw);

        // Both sides write and read at once; neither waits for the other.
        let (l, r) = tokio::join!(
            async {
                let (w, m) = tokio::join!(left.write_msg(Msg::new(1, vec![1u8])), left.read_msg());
                w.unwrap();
                m.unwrap()
            },
            async {
                let (w, m) = tokio::join!(right.write_msg(Msg::new(2, vec![2u8])), right.read_msg());
                w.unwrap();
                m.unwrap()
            }
        );
        assert_eq!(l.code, 2);
        assert_eq!(r.code, 1);
    }
}
