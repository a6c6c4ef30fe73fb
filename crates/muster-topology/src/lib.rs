//! Muster Topology Synthesis
//!
//! Turns an unordered group snapshot into a numbered mesh plan. Members
//! are ranked by ascending lexicographic node id, ranks map to addresses
//! under a fixed private prefix, and the result is partitioned into the
//! requesting node (with its private key) and its peers (public keys
//! only).
//!
//! The projection is pure and deterministic: the same snapshot and
//! requester always produce the same plan, which is what lets a node
//! reconnect to the same mesh slot across repeated fetches.

mod addr;

pub use addr::{mesh_address, MESH_PREFIX};

use std::net::Ipv4Addr;

use muster_registry::{GroupSnapshot, NodeId};
use thiserror::Error;

/// Result type for topology synthesis.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during synthesis.
#[derive(Debug, Error)]
pub enum Error {
    /// The requester is missing from the snapshot. The registry confirms
    /// membership before synthesis runs, so hitting this is a caller
    /// bug, not bad user input.
    #[error("requesting node {0} is not part of the group snapshot")]
    RequesterNotInGroup(NodeId),
}

/// The requesting node's own slot in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfNode {
    /// Mesh address derived from the node's rank.
    pub address: Ipv4Addr,
    /// The node's own private key, base64 encoded.
    pub private_key: String,
}

/// Another member of the mesh, as seen by the requester.
///
/// Carries only public material; private keys never cross node
/// boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Mesh address derived from the peer's rank.
    pub address: Ipv4Addr,
    /// Source address the peer registered from, used as its endpoint.
    pub endpoint: String,
    /// The peer's public key, base64 encoded.
    pub public_key: String,
}

/// A complete mesh configuration for one requester.
#[derive(Debug, Clone)]
pub struct MeshPlan {
    /// The requester's slot.
    pub node: SelfNode,
    /// Every other member, in rank order.
    pub peers: Vec<Peer>,
}

/// Rank every member of the snapshot and split the result into the
/// requester and its peers.
///
/// Ranks are 1-based positions in ascending lexicographic node-id
/// order. Identical snapshot and requester produce an identical plan.
pub fn synthesize(snapshot: &GroupSnapshot, requester: &NodeId) -> Result<MeshPlan> {
    let mut node = None;
    let mut peers = Vec::with_capacity(snapshot.len().saturating_sub(1));

    // Snapshot iteration is already in ascending node-id order.
    for (position, (id, keys)) in snapshot.iter().enumerate() {
        let address = mesh_address(position as u32 + 1);
        if id == requester {
            node = Some(SelfNode {
                address,
                private_key: keys.private_base64(),
            });
        } else {
            peers.push(Peer {
                address,
                endpoint: id.to_string(),
                public_key: keys.public_base64(),
            });
        }
    }

    match node {
        Some(node) => Ok(MeshPlan { node, peers }),
        None => Err(Error::RequesterNotInGroup(requester.clone())),
    }
}
