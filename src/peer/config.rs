//! Peer List Configuration
//!
//! Cluster membership is static: an ordered text file read once at startup.
//! Line order determines node ids, so every peer must use the same file.
//!
//! Two formats exist: the standard one (one IP address per line, all peers
//! on the well-known port) and a local test variant (`address port` per
//! line) that lets several peers share one host.

use crate::packet::types::NodeRecord;
use crate::registry::registry::NodeRegistry;

use anyhow::{bail, Context, Result};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Port every peer listens on in a standard deployment.
pub const DEFAULT_PEER_PORT: u16 = 6000;

/// Default peer list, one address per line.
pub const DEFAULT_CONFIG_PATH: &str = "config.txt";

/// Default peer list for the local test variant, `address port` per line.
pub const DEFAULT_LOCAL_CONFIG_PATH: &str = "configLocal.txt";

/// Reads the standard peer list: one IP address per line, implied port.
pub fn load_peer_addresses(path: &Path) -> Result<Vec<SocketAddr>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read peer config {}", path.display()))?;
    parse_peer_addresses(&contents)
}

/// Reads the local test peer list: `address port` per line.
pub fn load_peer_addresses_local(path: &Path) -> Result<Vec<SocketAddr>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read peer config {}", path.display()))?;
    parse_peer_addresses_local(&contents)
}

pub fn parse_peer_addresses(contents: &str) -> Result<Vec<SocketAddr>> {
    let mut peers = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let address: IpAddr = line
            .parse()
            .with_context(|| format!("invalid peer address on line {}: {}", number + 1, line))?;
        peers.push(SocketAddr::new(address, DEFAULT_PEER_PORT));
    }
    Ok(peers)
}

pub fn parse_peer_addresses_local(contents: &str) -> Result<Vec<SocketAddr>> {
    let mut peers = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (address, port) = match (fields.next(), fields.next()) {
            (Some(address), Some(port)) => (address, port),
            _ => bail!("expected 'address port' on line {}: {}", number + 1, line),
        };

        let address: IpAddr = address
            .parse()
            .with_context(|| format!("invalid peer address on line {}: {}", number + 1, line))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid peer port on line {}: {}", number + 1, line))?;
        peers.push(SocketAddr::new(address, port));
    }
    Ok(peers)
}

/// Position of this node in the standard list, matched by address.
pub fn position_of_address(peers: &[SocketAddr], address: IpAddr) -> Option<usize> {
    peers.iter().position(|peer| peer.ip() == address)
}

/// Position of this node in the local test list, matched by port.
pub fn position_of_port(peers: &[SocketAddr], port: u16) -> Option<usize> {
    peers.iter().position(|peer| peer.port() == port)
}

/// Builds the initial registry from the peer list; ids are list positions.
pub fn registry_from_peers(peers: &[SocketAddr]) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for (index, peer) in peers.iter().enumerate() {
        registry.insert(NodeRecord::registered(peer.ip(), peer.port(), index as i32));
    }
    registry
}
