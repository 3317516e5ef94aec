//! Follower Module
//!
//! The client side of the client-server topology. A follower handshakes with
//! the configured leader to obtain an identity, then reports its own
//! availability on a jittered cadence and adopts the registry broadcast the
//! leader answers with.
//!
//! ## Failure Handling
//! Response timeouts are the protocol's failure-detection signal, not an
//! error path: one missed response triggers a single re-handshake, a second
//! consecutive miss declares the leader dead and runs the promotion
//! algorithm to pick a successor from the last known registry snapshot.
//!
//! Identity survives process restarts through a small JSON file, honored
//! only while the persisted leader address still matches.

pub mod identity;
pub mod promotion;
pub mod service;
pub mod types;
