//! Peer Gossip Module
//!
//! The decentralized topology: no leader, no promotion. Every peer reads
//! the same ordered address list at startup (list position is the node id),
//! then runs an independent, jittered heartbeat loop.
//!
//! ## Scoring Model
//! Hearing from a peer is banked in a received-from set; the score is paid
//! out at send time, coupling "did I hear from them" with this peer's own
//! cadence rather than a global clock. Liveness is the percentage of this
//! peer's own rounds the other node was heard in, with a 30% cutoff. The
//! numbers are advisory and not comparable across peers with different
//! uptimes.

pub mod config;
pub mod service;

#[cfg(test)]
mod tests;
