//! Wire Protocol Module
//!
//! Defines the typed envelope exchanged between cluster nodes and the codec
//! that frames it into UDP datagrams.
//!
//! ## Envelope Shape
//! Every packet carries a protocol version, a topology mode, a packet kind,
//! reserved fragmentation flags, and a flat list of node records. Keeping the
//! payload a flat list lets multi-node broadcasts and single-node handshakes
//! reuse one envelope shape.
//!
//! ## Dispatch Rules
//! A node only processes envelopes whose version and mode match its own;
//! everything else is dropped without being treated as an error.

pub mod codec;
pub mod types;
