use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Version stamped into every envelope. Receivers drop envelopes whose
/// version differs from their own.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest datagram a client-server node will send or receive.
pub const MAX_DATAGRAM_CLIENT_SERVER: usize = 1024;

/// Largest datagram a gossip peer will send or receive.
pub const MAX_DATAGRAM_PEER: usize = 500;

/// Identifier assigned to a node, unique within one leader epoch.
pub type NodeId = i32;

/// Sentinel id of a node that has not completed a handshake yet.
pub const UNASSIGNED_ID: NodeId = -1;

/// The topology a node participates in. Envelopes from the other mode are
/// ignored even when the version matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolMode {
    ClientServer,
    PeerToPeer,
}

/// The kind of packet inside an envelope.
///
/// Client-server mode uses the first four; peer mode uses only `PeerHeartbeat`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PacketKind {
    /// Follower -> leader: request an identity (or confirm an existing one).
    HandshakeRequest,
    /// Leader -> follower: the assigned node record.
    HandshakeResponse,
    /// Follower -> leader: "I am alive this round".
    AvailabilityReport,
    /// Leader -> followers: the full registry snapshot for the round.
    AvailabilityBroadcast,
    /// Peer -> peer: gossip heartbeat carrying the sender's record.
    PeerHeartbeat,
}

/// Fragmentation flags, reserved for multi-packet payloads.
///
/// Splitting is unimplemented; every envelope currently travels as a single,
/// complete fragment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketFlags {
    pub can_be_split: bool,
    pub last_fragment: bool,
}

impl PacketFlags {
    /// Flags of a payload that may be split across datagrams in the future
    /// (registry broadcasts are stamped this way).
    pub fn splittable() -> Self {
        Self {
            can_be_split: true,
            last_fragment: true,
        }
    }
}

impl Default for PacketFlags {
    fn default() -> Self {
        Self {
            can_be_split: false,
            last_fragment: true,
        }
    }
}

/// One cluster member as known by the sender of an envelope.
///
/// Identity is the `node_id` alone; endpoints may change across reconnects,
/// so lookups always go through the id, never the address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub address: IpAddr,
    pub port: u16,
    pub node_id: NodeId,
    /// Monotonically non-decreasing count of heartbeat rounds this node was
    /// observed in.
    pub availability: u32,
    /// Client-server only: the node missed the most recent heartbeat round.
    pub dead: bool,
}

impl NodeRecord {
    /// A freshly registered record. The node counts as dead until it
    /// survives a full heartbeat round.
    pub fn registered(address: IpAddr, port: u16, node_id: NodeId) -> Self {
        Self {
            address,
            port,
            node_id,
            availability: 0,
            dead: true,
        }
    }

    /// A record for a node that has not been assigned an identity yet.
    pub fn unassigned(address: IpAddr, port: u16) -> Self {
        Self::registered(address, port, UNASSIGNED_ID)
    }

    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// The unit exchanged on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub version: u8,
    pub mode: ProtocolMode,
    pub kind: PacketKind,
    pub flags: PacketFlags,
    pub records: Vec<NodeRecord>,
}

impl Envelope {
    /// Builds an envelope for the current protocol version with default
    /// (single complete fragment) flags.
    pub fn new(mode: ProtocolMode, kind: PacketKind, records: Vec<NodeRecord>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            mode,
            kind,
            flags: PacketFlags::default(),
            records,
        }
    }

    /// Builds an envelope carrying exactly one record (handshakes, reports,
    /// peer heartbeats).
    pub fn single(mode: ProtocolMode, kind: PacketKind, record: NodeRecord) -> Self {
        Self::new(mode, kind, vec![record])
    }

    /// Builds a registry broadcast, stamped splittable for future
    /// fragmentation support.
    pub fn broadcast(records: Vec<NodeRecord>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            mode: ProtocolMode::ClientServer,
            kind: PacketKind::AvailabilityBroadcast,
            flags: PacketFlags::splittable(),
            records,
        }
    }

    /// Whether this envelope should be processed by a node running `mode`.
    /// Mismatches are dropped by callers, not surfaced as errors.
    pub fn matches(&self, mode: ProtocolMode) -> bool {
        self.version == PROTOCOL_VERSION && self.mode == mode
    }

    pub fn first_record(&self) -> Option<&NodeRecord> {
        self.records.first()
    }
}
