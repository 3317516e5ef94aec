//! Insertion-ordered node registry and per-round live set.
//!
//! Both structures are plain data: the services that own them wrap them in a
//! single mutex so round scoring and inbound-packet handling serialize.

use crate::packet::types::{NodeId, NodeRecord};

use std::collections::HashSet;
use std::net::IpAddr;

/// Ordered mapping from node id to record; insertion order is join order.
///
/// Ids are unique. Lookups go through the id alone, never the endpoint.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    records: Vec<NodeRecord>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<NodeRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.records.iter().find(|record| record.node_id == id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.records.iter_mut().find(|record| record.node_id == id)
    }

    /// Appends a record, keeping join order. Rejects duplicate ids.
    pub fn insert(&mut self, record: NodeRecord) -> bool {
        if self.contains(record.node_id) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Points an existing record at a new endpoint (reconnect after an
    /// address or port change). Score and position are untouched.
    pub fn update_endpoint(&mut self, id: NodeId, address: IpAddr, port: u16) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.address = address;
                record.port = port;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeRecord> {
        let index = self.records.iter().position(|record| record.node_id == id)?;
        Some(self.records.remove(index))
    }

    /// Replaces the whole view, e.g. when a follower adopts a broadcast.
    pub fn replace_all(&mut self, records: Vec<NodeRecord>) {
        self.records = records;
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeRecord> {
        self.records.iter_mut()
    }

    pub fn snapshot(&self) -> Vec<NodeRecord> {
        self.records.clone()
    }

    /// Scores one heartbeat round: every node in the live set gains a point
    /// and counts as alive; everyone else is marked dead with its score
    /// untouched. Scores never decrease.
    pub fn apply_round(&mut self, live: &LiveSet) {
        for record in &mut self.records {
            if live.contains(record.node_id) {
                record.availability += 1;
                record.dead = false;
            } else {
                record.dead = true;
            }
        }
    }
}

/// Transient set of node ids heard from in the current round.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    ids: HashSet<NodeId>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a node as heard from. Idempotent within a round; returns
    /// false when the id was already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    /// Removes one id, returning whether it was present. The gossip engine
    /// consumes entries this way while scoring at send time.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.ids.remove(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
