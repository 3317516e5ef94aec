//! Leader Module
//!
//! The server side of the client-server topology. The leader owns the
//! authoritative registry: it assigns sequential node ids during handshakes,
//! collects availability reports into a per-round live set, and every 30
//! seconds scores the round and broadcasts the full cluster view back to the
//! nodes that reported.
//!
//! Every inbound datagram is handled on its own task; all of them serialize
//! on a single mutex around the registry, live set, and id counter.

pub mod service;
