//! Identity Persistence
//!
//! A follower's assigned id is tied to the leader epoch that issued it.
//! Persisting `{node_id, leader_addr}` lets a restarted process resume
//! without a fresh handshake, but only while it still points at the same
//! leader. Missing or unreadable files are simply "no prior identity" and
//! never fatal.

use crate::packet::types::NodeId;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default location of the identity file, relative to the working directory.
pub const DEFAULT_IDENTITY_PATH: &str = "identity.json";

/// The identity a follower writes after a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub node_id: NodeId,
    pub leader_addr: SocketAddr,
}

/// File-backed store for the follower's assigned identity.
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted identity, if any. Unparsable files are logged
    /// and treated as absent.
    pub fn load(&self) -> Option<PersistedIdentity> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(
                    "ignoring unparsable identity file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Returns the persisted node id only when it was issued by `leader`.
    /// An id from a different leader belongs to a dead epoch.
    pub fn load_for(&self, leader: SocketAddr) -> Option<NodeId> {
        let identity = self.load()?;
        if identity.leader_addr == leader {
            Some(identity.node_id)
        } else {
            tracing::info!(
                "persisted identity belongs to {}, not {}; starting fresh",
                identity.leader_addr,
                leader
            );
            None
        }
    }

    pub fn save(&self, identity: &PersistedIdentity) -> Result<()> {
        let json = serde_json::to_vec(identity)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write identity file {}", self.path.display()))
    }

    /// Deletes the identity file. Called before promotion: the id belongs
    /// to the dead leader's epoch.
    pub fn discard(&self) {
        let _ = fs::remove_file(&self.path);
    }
}
