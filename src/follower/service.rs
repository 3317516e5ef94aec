//! Follower Protocol Loop
//!
//! Drives the handshake/heartbeat state machine against the configured
//! leader over a single ephemeral UDP socket. Timeouts move the machine,
//! transport errors are logged and retried on the next cycle, and envelopes
//! that are malformed or belong to another version/mode are dropped without
//! consuming the response deadline.

use super::identity::{IdentityStore, PersistedIdentity};
use super::promotion::{self, Promotion};
use super::types::{
    FollowerExit, FollowerState, HEARTBEAT_JITTER_SECS, PROMOTION_BACKOFF, RESPONSE_TIMEOUT,
};
use crate::packet::codec;
use crate::packet::types::{
    Envelope, NodeRecord, PacketKind, ProtocolMode, MAX_DATAGRAM_CLIENT_SERVER,
};
use crate::registry::registry::NodeRegistry;
use crate::registry::types::Liveness;

use anyhow::{bail, Context, Result};
use rand::Rng;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Duration, Instant};

/// One follower node: its socket, its view of the cluster, and its position
/// in the protocol.
pub struct FollowerService {
    socket: UdpSocket,
    leader_addr: SocketAddr,
    self_record: NodeRecord,
    known: NodeRegistry,
    identity: IdentityStore,
    state: FollowerState,
    consecutive_timeouts: u32,
}

impl FollowerService {
    /// Opens an ephemeral socket for talking to the leader at `leader_addr`.
    pub async fn connect(leader_addr: SocketAddr, identity: IdentityStore) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .context("failed to open follower socket")?;
        let local = socket.local_addr()?;

        Ok(Self {
            socket,
            leader_addr,
            // The leader overwrites the endpoint with the datagram source,
            // so the local view is only a placeholder until the handshake.
            self_record: NodeRecord::unassigned(local.ip(), local.port()),
            known: NodeRegistry::new(),
            identity,
            state: FollowerState::Unregistered,
            consecutive_timeouts: 0,
        })
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn leader_addr(&self) -> SocketAddr {
        self.leader_addr
    }

    /// Runs the protocol until this node wins promotion (the caller then
    /// starts the leader dispatcher) or an unrecoverable cluster failure.
    pub async fn run(mut self) -> Result<FollowerExit> {
        loop {
            self.state = match self.state {
                FollowerState::Unregistered => {
                    if let Some(id) = self.identity.load_for(self.leader_addr) {
                        tracing::info!("restored persisted identity {}", id);
                        self.self_record.node_id = id;
                    }
                    FollowerState::AwaitingHandshake
                }

                FollowerState::AwaitingHandshake => self.handshake().await,

                FollowerState::Active => self.heartbeat_round().await,

                FollowerState::Promoting => {
                    // The persisted id belongs to the dead leader's epoch.
                    self.identity.discard();

                    match promotion::choose_successor(&mut self.known, self.self_record.node_id) {
                        None => {
                            bail!("no live promotion candidate; cluster cannot recover")
                        }
                        Some(Promotion::SelfPromote) => {
                            tracing::info!("promoted to leader");
                            return Ok(FollowerExit::Promoted);
                        }
                        Some(Promotion::Redirect(candidate)) => {
                            // The promoted node listens on the well-known
                            // leader port, not its old follower port.
                            self.leader_addr =
                                SocketAddr::new(candidate.address, self.leader_addr.port());
                            tracing::info!(
                                "node {} promoted; redirecting to {}",
                                candidate.node_id,
                                self.leader_addr
                            );
                            FollowerState::Redirected
                        }
                    }
                }

                FollowerState::Redirected => {
                    sleep(PROMOTION_BACKOFF).await;
                    FollowerState::AwaitingHandshake
                }
            };
        }
    }

    /// Sends a handshake request and adopts the assigned record from the
    /// response.
    async fn handshake(&mut self) -> FollowerState {
        let request = Envelope::single(
            ProtocolMode::ClientServer,
            PacketKind::HandshakeRequest,
            self.self_record.clone(),
        );
        self.send(&request).await;

        match self.await_reply(PacketKind::HandshakeResponse).await {
            Some(envelope) => match envelope.records.into_iter().next() {
                Some(assigned) => {
                    tracing::info!("handshake complete, assigned id {}", assigned.node_id);
                    self.self_record = assigned;
                    self.consecutive_timeouts = 0;

                    let identity = PersistedIdentity {
                        node_id: self.self_record.node_id,
                        leader_addr: self.leader_addr,
                    };
                    if let Err(e) = self.identity.save(&identity) {
                        tracing::warn!("could not persist identity: {:#}", e);
                    }

                    FollowerState::Active
                }
                None => {
                    tracing::warn!("handshake response carried no record");
                    self.on_timeout()
                }
            },
            None => self.on_timeout(),
        }
    }

    /// One heartbeat round: jittered delay, availability report, then the
    /// broadcast with the cluster view.
    async fn heartbeat_round(&mut self) -> FollowerState {
        let delay = rand::thread_rng().gen_range(0..=HEARTBEAT_JITTER_SECS);
        sleep(Duration::from_secs(delay)).await;

        let report = Envelope::single(
            ProtocolMode::ClientServer,
            PacketKind::AvailabilityReport,
            self.self_record.clone(),
        );
        self.send(&report).await;

        match self.await_reply(PacketKind::AvailabilityBroadcast).await {
            Some(envelope) => {
                self.known.replace_all(envelope.records);
                self.consecutive_timeouts = 0;
                self.report_liveness();
                FollowerState::Active
            }
            None => self.on_timeout(),
        }
    }

    /// Timeout policy: the first miss re-handshakes once; a second
    /// consecutive miss declares the leader dead.
    fn on_timeout(&mut self) -> FollowerState {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts == 1 {
            tracing::warn!("no response from leader {}; re-handshaking", self.leader_addr);
            FollowerState::AwaitingHandshake
        } else {
            tracing::warn!("leader {} unresponsive; selecting successor", self.leader_addr);
            self.consecutive_timeouts = 0;
            FollowerState::Promoting
        }
    }

    async fn send(&self, envelope: &Envelope) {
        let bytes = match codec::encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("failed to encode packet: {}", e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&bytes, self.leader_addr).await {
            tracing::warn!("send to {} failed: {}", self.leader_addr, e);
        }
    }

    /// Waits up to [`RESPONSE_TIMEOUT`] for an envelope of the expected
    /// kind. Junk, version/mode mismatches, and unexpected kinds are
    /// dropped without extending or resetting the deadline.
    async fn await_reply(&mut self, expected: PacketKind) -> Option<Envelope> {
        let mut buf = [0u8; MAX_DATAGRAM_CLIENT_SERVER];
        let deadline = Instant::now() + RESPONSE_TIMEOUT;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let received = match timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Err(_) => return None,
                Ok(Err(e)) => {
                    tracing::warn!("receive failed: {}", e);
                    return None;
                }
                Ok(Ok(received)) => received,
            };

            let (len, from) = received;
            let envelope = match codec::decode(&buf[..len]) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!("dropping packet from {}: {}", from, e);
                    continue;
                }
            };

            if !envelope.matches(ProtocolMode::ClientServer) {
                tracing::debug!("dropping envelope from another version/mode");
                continue;
            }
            if envelope.kind != expected {
                tracing::debug!("ignoring {:?} while waiting for {:?}", envelope.kind, expected);
                continue;
            }

            return Some(envelope);
        }
    }

    /// One line per known node, printed after every adopted broadcast.
    fn report_liveness(&self) {
        for record in self.known.iter() {
            tracing::info!(
                "Address: {} | Port: {} | Availability: {} | Status: {}",
                record.address,
                record.port,
                record.availability,
                Liveness::from_dead_flag(record.dead)
            );
        }
    }
}
