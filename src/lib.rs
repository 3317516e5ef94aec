//! Heartbeat Cluster Library
//!
//! This library crate defines the core modules of a small high-availability
//! cluster that detects unreachable nodes through periodic UDP heartbeats.
//! It serves as the foundation for the binary executable (`main.rs`), which
//! runs a node in one of two topologies: a centralized client-server model
//! (one elected leader polled by followers) or a decentralized peer-to-peer
//! gossip model (all nodes exchange heartbeats directly).
//!
//! ## Architecture Modules
//!
//! - **`packet`**: The wire layer. Defines the versioned envelope exchanged
//!   between nodes and the bincode codec that frames it into UDP datagrams.
//! - **`registry`**: The shared availability model. An insertion-ordered
//!   registry of known nodes with id-keyed lookup, per-round liveness
//!   tracking, and the scoring rules both topologies build on.
//! - **`follower`**: The client side of the client-server protocol. Runs the
//!   handshake/heartbeat state machine, detects leader failure through
//!   response timeouts, and selects a successor leader when it occurs.
//! - **`leader`**: The server side of the client-server protocol. Assigns
//!   node identities, scores each 30-second round, and broadcasts the
//!   cluster view back to live followers.
//! - **`peer`**: The gossip topology. Every node runs an independent
//!   jittered heartbeat loop and classifies its peers by the percentage of
//!   rounds it heard from them.

pub mod follower;
pub mod leader;
pub mod packet;
pub mod peer;
pub mod registry;
