//! Node Registry Module
//!
//! The shared availability model both topologies build on: which nodes
//! exist, how many heartbeat rounds each has been observed in, and whether
//! they count as alive.
//!
//! ## Core Structures
//! - **`NodeRegistry`**: insertion-ordered collection of node records with
//!   id-keyed lookup. Order is join order, which makes leader promotion
//!   deterministic.
//! - **`LiveSet`**: the transient per-round set of node ids heard from. The
//!   gossip engine reuses it as its received-from set.
//!
//! Nodes are matched strictly by id. Endpoints can change across reconnects
//! and are never used as identity.

pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;
