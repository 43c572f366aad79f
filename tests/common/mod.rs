//! Shared fixtures: in-memory transports, chain parameters and a
//! recording service.

#![allow(dead_code)]

use async_trait::async_trait;
use guardian::network::{Msg, MsgReadWriter, StreamTransport, TransportError};
use guardian::protocol::{ChainParams, Peer, StatusData};
use guardian::service::{ErrorReporter, Service, ServiceError};
use guardian::types::{ConnectionDirection, PeerId};
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

pub const NETWORK_ID: u64 = 1000;
pub const CHAIN_ID: u32 = 8217;
pub const GENESIS: [u8; 32] = [0xAA; 32];
pub const VERSION: u32 = 65;

pub fn params() -> ChainParams {
    ChainParams::new(NETWORK_ID, BigUint::from(CHAIN_ID), GENESIS)
}

pub fn status() -> StatusData {
    StatusData {
        protocol_version: VERSION,
        network_id: NETWORK_ID,
        td: BigUint::from(1u32),
        current_block: [0u8; 32],
        genesis_block: GENESIS,
        chain_id: BigUint::from(CHAIN_ID),
    }
}

/// Two connected in-memory transports
pub fn transport_pair() -> (Arc<dyn MsgReadWriter>, Arc<dyn MsgReadWriter>) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    (
        Arc::new(StreamTransport::new(a_read, a_write)),
        Arc::new(StreamTransport::new(b_read, b_write)),
    )
}

/// Local peer named `id` plus the raw transport of its remote end
pub fn peer_pair(id: &str) -> (Peer, Arc<dyn MsgReadWriter>) {
    let (local, remote) = transport_pair();
    let peer = Peer::new(PeerId::from(id), local, VERSION, ConnectionDirection::Inbound);
    (peer, remote)
}

/// Same as `peer_pair`, but the local side counts every read it starts
pub fn counted_peer_pair(id: &str) -> (Peer, Arc<dyn MsgReadWriter>, Arc<AtomicUsize>) {
    let (local, remote) = transport_pair();
    let reads = Arc::new(AtomicUsize::new(0));
    let counting = CountingTransport {
        inner: local,
        reads: reads.clone(),
    };
    let peer = Peer::new(
        PeerId::from(id),
        Arc::new(counting),
        VERSION,
        ConnectionDirection::Inbound,
    );
    (peer, remote, reads)
}

struct CountingTransport {
    inner: Arc<dyn MsgReadWriter>,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl MsgReadWriter for CountingTransport {
    async fn read_msg(&self) -> Result<Msg, TransportError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_msg().await
    }

    async fn write_msg(&self, msg: Msg) -> Result<(), TransportError> {
        self.inner.write_msg(msg).await
    }
}

/// Play the remote side of the handshake: send `status`, read the local one
pub async fn remote_handshake(remote: &Arc<dyn MsgReadWriter>, status: &StatusData) -> Msg {
    remote
        .write_msg(Msg::encode(0x00, status))
        .await
        .unwrap();
    remote.read_msg().await.unwrap()
}

/// Poll `check` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Records the code of every message it handles; optionally fails on one code
pub struct RecordingService {
    name: String,
    fail_on: Option<u64>,
    fail_start: bool,
    fail_stop: bool,
    seen: Mutex<Vec<u64>>,
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl RecordingService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_on: None,
            fail_start: false,
            fail_stop: false,
            seen: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, code: u64) -> Self {
        self.fail_on = Some(code);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for RecordingService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(ServiceError::Start {
                service: self.name.clone(),
                reason: "refused".to_string(),
            });
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ServiceError::Stop {
                service: self.name.clone(),
                reason: "stuck".to_string(),
            });
        }
        Ok(())
    }

    async fn handle_msg(&self, msg: Msg, errors: ErrorReporter) {
        self.seen.lock().push(msg.code);
        if self.fail_on == Some(msg.code) {
            errors.report(ServiceError::Failed {
                service: self.name.clone(),
                reason: format!("rejected message {}", msg.code),
            });
        }
    }
}

/// Records each message only after every service sharing its barrier has
/// reached it, so it completes only when services run side by side
pub struct BarrierService {
    name: String,
    barrier: Arc<Barrier>,
    seen: Mutex<Vec<u64>>,
}

impl BarrierService {
    pub fn new(name: &str, barrier: Arc<Barrier>) -> Self {
        Self {
            name: name.to_string(),
            barrier,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Service for BarrierService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn handle_msg(&self, msg: Msg, _errors: ErrorReporter) {
        self.barrier.wait().await;
        self.seen.lock().push(msg.code);
    }
}

/// Never finishes handling a message
pub struct StuckService;

#[async_trait]
impl Service for StuckService {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn handle_msg(&self, _msg: Msg, _errors: ErrorReporter) {
        std::future::pending::<()>().await;
    }
}
