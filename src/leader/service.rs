//! Leader Dispatcher
//!
//! Binds the well-known leader port (failure to bind is fatal: the node
//! cannot participate), then serves handshakes and availability reports.
//! The round timer starts lazily with the first received datagram and fires
//! every 30 seconds for the lifetime of the process.

use crate::packet::codec;
use crate::packet::types::{
    Envelope, NodeId, NodeRecord, PacketKind, ProtocolMode, MAX_DATAGRAM_CLIENT_SERVER,
    UNASSIGNED_ID,
};
use crate::registry::registry::{LiveSet, NodeRegistry};
use crate::registry::types::Liveness;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

/// Port a promoted leader binds; followers that redirect keep their
/// configured port, which is this one in any standard deployment.
pub const DEFAULT_LEADER_PORT: u16 = 6000;

/// How often the leader scores a round and broadcasts the registry.
pub const ROUND_INTERVAL: Duration = Duration::from_secs(30);

/// Registry, live set, and id counter, mutated together under one lock.
pub(crate) struct LeaderState {
    pub(crate) registry: NodeRegistry,
    pub(crate) live: LiveSet,
    pub(crate) next_id: NodeId,
    round_started: bool,
}

impl LeaderState {
    fn new() -> Self {
        Self {
            registry: NodeRegistry::new(),
            live: LiveSet::new(),
            next_id: 0,
            round_started: false,
        }
    }

    /// Scores the round and drains the live set. Returns the snapshot to
    /// broadcast and the ids that reported (dead nodes are presumed
    /// unreachable and get no update).
    pub(crate) fn close_round(&mut self) -> (Vec<NodeRecord>, Vec<NodeId>) {
        self.registry.apply_round(&self.live);
        let snapshot = self.registry.snapshot();
        let recipients = snapshot
            .iter()
            .filter(|record| self.live.contains(record.node_id))
            .map(|record| record.node_id)
            .collect();
        self.live.clear();
        (snapshot, recipients)
    }
}

/// The leader node: bound socket plus the shared round state.
pub struct LeaderService {
    socket: UdpSocket,
    pub(crate) state: Mutex<LeaderState>,
}

impl LeaderService {
    /// Binds the leader socket. A port conflict means the node cannot
    /// participate, so the error propagates to a fatal exit.
    pub async fn bind(port: u16) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("port {} already bound to another socket", port))?;

        Ok(Arc::new(Self {
            socket,
            state: Mutex::new(LeaderState::new()),
        }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive loop: each datagram is parsed and handled on its own task.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        tracing::info!("leader listening on {}", self.local_addr()?);
        let mut buf = [0u8; MAX_DATAGRAM_CLIENT_SERVER];

        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!("receive failed: {}", e);
                    continue;
                }
            };

            // The round timer starts lazily with the first datagram.
            {
                let mut state = self.state.lock().await;
                if !state.round_started {
                    state.round_started = true;
                    let service = self.clone();
                    tokio::spawn(async move {
                        loop {
                            tokio::time::sleep(ROUND_INTERVAL).await;
                            service.run_round().await;
                        }
                    });
                }
            }

            let service = self.clone();
            let bytes = buf[..len].to_vec();
            tokio::spawn(async move {
                service.handle_datagram(&bytes, from).await;
            });
        }
    }

    /// Dispatches one decoded datagram. Malformed bytes and envelopes from
    /// another version or mode are dropped, never propagated as errors.
    pub async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let envelope = match codec::decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("dropping packet from {}: {}", from, e);
                return;
            }
        };

        if !envelope.matches(ProtocolMode::ClientServer) {
            tracing::debug!("dropping envelope from another version/mode");
            return;
        }

        match envelope.kind {
            PacketKind::HandshakeRequest => match envelope.first_record() {
                Some(record) => self.handle_handshake(record, from).await,
                None => tracing::warn!("handshake request from {} carried no record", from),
            },
            PacketKind::AvailabilityReport => {
                if let Some(record) = envelope.first_record() {
                    self.handle_report(record).await;
                }
            }
            other => {
                tracing::debug!("ignoring unexpected {:?} from {}", other, from);
            }
        }
    }

    /// Assigns an id to a new client, or refreshes the endpoint of a known
    /// one (reconnect support). Either way the client gets its record back.
    async fn handle_handshake(&self, record: &NodeRecord, from: SocketAddr) {
        let assigned = {
            let mut state = self.state.lock().await;

            if record.node_id != UNASSIGNED_ID && state.registry.contains(record.node_id) {
                state
                    .registry
                    .update_endpoint(record.node_id, from.ip(), from.port());
                tracing::info!("client {} reconnected from {}", record.node_id, from);
                state.registry.get(record.node_id).cloned()
            } else {
                // Unknown ids come from a previous leader's epoch and are
                // replaced just like fresh joins.
                let id = state.next_id;
                state.next_id += 1;
                let fresh = NodeRecord::registered(from.ip(), from.port(), id);
                state.registry.insert(fresh.clone());
                tracing::info!("registered client {} at {}", id, from);
                Some(fresh)
            }
        };

        if let Some(assigned) = assigned {
            let reply = Envelope::single(
                ProtocolMode::ClientServer,
                PacketKind::HandshakeResponse,
                assigned,
            );
            self.send(&reply, from).await;
        }
    }

    /// Marks the reporting node live for the current round. Idempotent.
    async fn handle_report(&self, record: &NodeRecord) {
        if record.node_id == UNASSIGNED_ID {
            tracing::debug!("ignoring availability report without an id");
            return;
        }

        let mut state = self.state.lock().await;
        if state.live.insert(record.node_id) {
            tracing::debug!("heartbeat from client {}", record.node_id);
        }
    }

    /// Closes the current round: score, broadcast to reporters, report
    /// liveness, reset for the next round.
    pub async fn run_round(&self) {
        let (snapshot, recipients) = {
            let mut state = self.state.lock().await;
            state.close_round()
        };

        let broadcast = Envelope::broadcast(snapshot.clone());
        for record in &snapshot {
            if recipients.contains(&record.node_id) {
                self.send(&broadcast, record.endpoint()).await;
            }
        }

        for record in &snapshot {
            tracing::info!(
                "Address: {} | Port: {} | Availability: {} | Status: {}",
                record.address,
                record.port,
                record.availability,
                Liveness::from_dead_flag(record.dead)
            );
        }
    }

    /// Current registry view, in join order.
    pub async fn snapshot(&self) -> Vec<NodeRecord> {
        self.state.lock().await.registry.snapshot()
    }

    async fn send(&self, envelope: &Envelope, to: SocketAddr) {
        let bytes = match codec::encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("failed to encode packet: {}", e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&bytes, to).await {
            tracing::warn!("send to {} failed: {}", to, e);
        }
    }
}
