//! Leader Promotion
//!
//! When the leader stops responding, every follower independently scans its
//! last known registry snapshot for the successor. All followers saw the
//! same broadcasts, so they reach the same verdict without coordinating.

use crate::packet::types::{NodeId, NodeRecord, UNASSIGNED_ID};
use crate::registry::registry::NodeRegistry;

/// Outcome of successor selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Promotion {
    /// This node is the successor and must start the leader dispatcher.
    SelfPromote,
    /// Another node won; reconnect to it after it has had time to boot.
    Redirect(NodeRecord),
}

/// Picks the new leader from the last known registry snapshot.
///
/// A node that never completed a handshake has no snapshot to consult and
/// unconditionally promotes itself. Otherwise the candidate is the record
/// with the highest availability score among those not marked dead; on a
/// tie the earliest-joined record wins, so every follower picks the same
/// node. The chosen candidate is removed from the local copy so a later
/// timeout cannot re-select it.
///
/// Returns `None` when no live candidate exists (registry empty or all
/// dead) — the cluster cannot recover and the caller must treat this as
/// fatal.
pub fn choose_successor(known: &mut NodeRegistry, self_id: NodeId) -> Option<Promotion> {
    if self_id == UNASSIGNED_ID {
        return Some(Promotion::SelfPromote);
    }

    let mut best: Option<(NodeId, u32)> = None;
    for record in known.iter() {
        if record.dead {
            continue;
        }
        match best {
            Some((_, max)) if record.availability <= max => {}
            _ => best = Some((record.node_id, record.availability)),
        }
    }

    let (winner, _) = best?;
    let candidate = known.remove(winner)?;

    if candidate.node_id == self_id {
        Some(Promotion::SelfPromote)
    } else {
        Some(Promotion::Redirect(candidate))
    }
}
