//! Group identifiers, membership entries and read-time snapshots.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::keys::KeyPair;

/// Opaque identifier naming one mesh group.
///
/// Supplied by clients (typically a generated uuid); the registry does
/// not validate its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    /// Create an identifier from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node identity: the textual source address the client registered
/// from.
///
/// `Ord` is lexicographic on the string. That ordering is the sole
/// anchor for mesh address assignment, so it must never change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Create an identity from a source address string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get the raw source address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live membership of one group plus its expiry anchor.
///
/// `created_at` is set when the first node registers the identifier and
/// is never refreshed; the whole entry expires relative to it.
#[derive(Debug)]
pub(crate) struct GroupEntry {
    pub members: BTreeMap<NodeId, KeyPair>,
    pub created_at: Instant,
}

impl GroupEntry {
    pub fn new(created_at: Instant) -> Self {
        Self {
            members: BTreeMap::new(),
            created_at,
        }
    }

    /// Whether the entry has outlived `ttl` as of `now`.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created_at) >= ttl
    }
}

/// Immutable membership snapshot handed to topology synthesis.
///
/// Iteration order is ascending lexicographic [`NodeId`], which is what
/// makes rank assignment deterministic.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    members: BTreeMap<NodeId, KeyPair>,
}

impl GroupSnapshot {
    pub(crate) fn of(entry: &GroupEntry) -> Self {
        Self {
            members: entry.members.clone(),
        }
    }

    /// Whether `node` is part of the snapshot.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.contains_key(node)
    }

    /// Credentials for `node`, if it is a member.
    pub fn get(&self, node: &NodeId) -> Option<&KeyPair> {
        self.members.get(node)
    }

    /// Members in ascending lexicographic order of node id.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &KeyPair)> {
        self.members.iter()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<(NodeId, KeyPair)> for GroupSnapshot {
    fn from_iter<I: IntoIterator<Item = (NodeId, KeyPair)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ordering_is_lexicographic() {
        // Textual addresses sort as strings, not as numbers: "10.0.0.10"
        // comes before "10.0.0.2".
        let mut ids = vec![
            NodeId::new("10.0.0.2"),
            NodeId::new("10.0.0.10"),
            NodeId::new("10.0.0.1"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                NodeId::new("10.0.0.1"),
                NodeId::new("10.0.0.10"),
                NodeId::new("10.0.0.2"),
            ]
        );
    }

    #[test]
    fn snapshot_iterates_in_node_order() {
        let snapshot: GroupSnapshot = [
            (NodeId::new("c"), KeyPair::generate()),
            (NodeId::new("a"), KeyPair::generate()),
            (NodeId::new("b"), KeyPair::generate()),
        ]
        .into_iter()
        .collect();

        let order: Vec<&str> = snapshot.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn snapshot_from_nothing_is_empty() {
        let snapshot: GroupSnapshot = std::iter::empty::<(NodeId, KeyPair)>().collect();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }

    #[test]
    fn entry_expiry_is_anchored_at_creation() {
        let t0 = Instant::now();
        let ttl = Duration::from_secs(300);
        let entry = GroupEntry::new(t0);

        assert!(!entry.is_expired(ttl, t0));
        assert!(!entry.is_expired(ttl, t0 + Duration::from_secs(299)));
        assert!(entry.is_expired(ttl, t0 + Duration::from_secs(300)));
        assert!(entry.is_expired(ttl, t0 + Duration::from_secs(301)));
    }
}
