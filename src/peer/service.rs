//! Peer Gossip Engine
//!
//! Runs one cooperative heartbeat loop (jittered sleep, then a round) and
//! one receive loop that hands each datagram to its own task. Both sides
//! serialize on a single mutex around the peer registry, the received-from
//! set, and the round counter.

use super::config;
use crate::packet::codec;
use crate::packet::types::{
    Envelope, NodeId, NodeRecord, PacketKind, ProtocolMode, MAX_DATAGRAM_PEER,
};
use crate::registry::registry::{LiveSet, NodeRegistry};
use crate::registry::types::{availability_percentage, classify, Liveness};

use anyhow::{Context, Result};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

/// Upper bound (inclusive, whole seconds) of the random delay between
/// heartbeat rounds.
pub const HEARTBEAT_JITTER_SECS: u64 = 30;

/// One peer's liveness verdict for the round, ready for the log.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoundRow {
    pub(crate) endpoint: SocketAddr,
    pub(crate) availability: u32,
    pub(crate) rounds: u32,
    pub(crate) status: Liveness,
}

/// Everything a round needs outside the lock: the record to advertise, the
/// peers to send it to, and the verdicts to report.
pub(crate) struct RoundOutcome {
    pub(crate) rounds_before: u32,
    pub(crate) self_record: NodeRecord,
    pub(crate) targets: Vec<SocketAddr>,
    pub(crate) rows: Vec<RoundRow>,
}

/// Peer registry, received-from set, and round counter, mutated together
/// under one lock.
pub(crate) struct PeerState {
    pub(crate) peers: NodeRegistry,
    pub(crate) received_from: LiveSet,
    pub(crate) rounds: u32,
}

impl PeerState {
    /// Scores the round at send time: every other peer heard from since the
    /// last round gains a point and leaves the received-from set. The very
    /// first round only advertises; there is nothing to score yet.
    ///
    /// Returns `None` only if the own id is missing from the registry,
    /// which the constructor rules out.
    pub(crate) fn score_round(&mut self, self_id: NodeId) -> Option<RoundOutcome> {
        let rounds_before = self.rounds;

        if rounds_before > 0 {
            for record in self.peers.iter_mut() {
                if record.node_id == self_id {
                    continue;
                }
                if self.received_from.remove(record.node_id) {
                    record.availability += 1;
                }
            }
        }
        self.rounds += 1;

        let self_record = self.peers.get(self_id).cloned()?;

        let targets = self
            .peers
            .iter()
            .filter(|record| record.node_id != self_id)
            .map(|record| record.endpoint())
            .collect();

        let rows = if rounds_before > 0 {
            self.peers
                .iter()
                .filter(|record| record.node_id != self_id)
                .map(|record| RoundRow {
                    endpoint: record.endpoint(),
                    availability: record.availability,
                    rounds: rounds_before,
                    status: classify(record.availability, rounds_before),
                })
                .collect()
        } else {
            Vec::new()
        };

        Some(RoundOutcome {
            rounds_before,
            self_record,
            targets,
            rows,
        })
    }

    /// Banks a heartbeat from `id` for the next scoring pass. Idempotent
    /// within a round; ids outside the configured cluster are dropped.
    pub(crate) fn record_heartbeat(&mut self, id: NodeId) -> bool {
        if !self.peers.contains(id) {
            tracing::debug!("heartbeat from unknown peer id {}", id);
            return false;
        }
        self.received_from.insert(id)
    }
}

/// One gossip peer: its bound socket, identity, and shared round state.
pub struct PeerService {
    socket: UdpSocket,
    self_id: NodeId,
    pub(crate) state: Mutex<PeerState>,
}

impl PeerService {
    /// Binds this peer's socket and seeds the registry from the configured
    /// list. `self_index` is this node's position in that list.
    pub async fn bind(peers: Vec<SocketAddr>, self_index: usize) -> Result<Arc<Self>> {
        let self_addr = peers
            .get(self_index)
            .copied()
            .context("own position missing from peer list")?;

        let socket = UdpSocket::bind(("0.0.0.0", self_addr.port()))
            .await
            .with_context(|| format!("port {} already bound to another socket", self_addr.port()))?;

        Ok(Arc::new(Self {
            socket,
            self_id: self_index as NodeId,
            state: Mutex::new(PeerState {
                peers: config::registry_from_peers(&peers),
                received_from: LiveSet::new(),
                rounds: 0,
            }),
        }))
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Runs the receive loop and the heartbeat loop until cancelled.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        tracing::info!("peer {} listening on {}", self.self_id, self.local_addr()?);

        let receiver = self.clone();
        tokio::spawn(async move {
            receiver.receive_loop().await;
        });

        loop {
            let delay = rand::thread_rng().gen_range(0..=HEARTBEAT_JITTER_SECS);
            tokio::time::sleep(Duration::from_secs(delay)).await;
            self.send_round().await;
        }
    }

    /// One heartbeat round: score what was heard, advertise own record to
    /// every other peer, report verdicts.
    pub async fn send_round(&self) {
        let outcome = {
            let mut state = self.state.lock().await;
            state.score_round(self.self_id)
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                tracing::error!("own id {} missing from peer registry", self.self_id);
                return;
            }
        };

        if outcome.rounds_before > 0 {
            tracing::info!("Heartbeat {}", outcome.rounds_before);
        }

        let envelope = Envelope::single(
            ProtocolMode::PeerToPeer,
            PacketKind::PeerHeartbeat,
            outcome.self_record,
        );
        let bytes = match codec::encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("failed to encode heartbeat: {}", e);
                return;
            }
        };

        for target in &outcome.targets {
            if let Err(e) = self.socket.send_to(&bytes, target).await {
                tracing::warn!("send to {} failed: {}", target, e);
            }
        }

        if outcome.rounds_before == 0 {
            for target in &outcome.targets {
                tracing::info!("Address: {} | First heartbeat", target.ip());
            }
            return;
        }

        for row in &outcome.rows {
            tracing::info!(
                "Address: {} | Port: {} | Availability: {} (out of {}) | Percentage Available: {:.2} | Status: {}",
                row.endpoint.ip(),
                row.endpoint.port(),
                row.availability,
                row.rounds,
                availability_percentage(row.availability, row.rounds),
                row.status
            );
        }
    }

    pub(crate) async fn receive_loop(self: Arc<Self>) {
        let mut buf = [0u8; MAX_DATAGRAM_PEER];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!("receive failed: {}", e);
                    continue;
                }
            };

            let service = self.clone();
            let bytes = buf[..len].to_vec();
            tokio::spawn(async move {
                service.handle_datagram(&bytes, from).await;
            });
        }
    }

    /// Banks one matching heartbeat. Malformed bytes and envelopes from
    /// another version or mode are dropped, never propagated as errors.
    pub async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let envelope = match codec::decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("dropping packet from {}: {}", from, e);
                return;
            }
        };

        if !envelope.matches(ProtocolMode::PeerToPeer) {
            tracing::debug!("dropping envelope from another version/mode");
            return;
        }
        if envelope.kind != PacketKind::PeerHeartbeat {
            tracing::debug!("ignoring unexpected {:?} from {}", envelope.kind, from);
            return;
        }

        if let Some(sender) = envelope.first_record() {
            let mut state = self.state.lock().await;
            if state.record_heartbeat(sender.node_id) {
                tracing::debug!("heartbeat from peer {}", sender.node_id);
            }
        }
    }
}
