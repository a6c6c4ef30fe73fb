//! The expiring group registry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::group::{GroupEntry, GroupId, GroupSnapshot, NodeId};
use crate::keys::KeyPair;

/// Time-to-live of a group, anchored at first registration.
pub const DEFAULT_GROUP_TTL: Duration = Duration::from_secs(300);

/// Bound on concurrently live groups.
pub const DEFAULT_MAX_GROUPS: usize = 100;

/// Tuning knobs for a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// How long a group stays readable after its first registration.
    pub ttl: Duration,
    /// Maximum number of live groups before eviction kicks in.
    pub max_groups: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_GROUP_TTL,
            max_groups: DEFAULT_MAX_GROUPS,
        }
    }
}

/// Outcome of a registration attempt.
///
/// Both variants are normal results. `AlreadyExists` is the idempotent
/// miss: the node is registered and keeps the credentials it got the
/// first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The node was added (and the group created if absent).
    Created,
    /// The node was already a member; nothing changed.
    AlreadyExists,
}

/// Expiring store of group membership.
///
/// Two named serialization domains: `register_gate` serializes all
/// registrations so at most one credential pair is ever generated per
/// node, and `fetch_gate` serializes all lookups. The map itself sits
/// behind its own mutex, so a fetch racing a registration sees either
/// the pre- or post-registration state, never a partial one.
///
/// Expiry is lazy. Lookups treat a past-TTL entry as absent without
/// mutating; registrations purge expired entries before checking the
/// capacity bound.
pub struct Registry {
    config: RegistryConfig,
    groups: Mutex<HashMap<GroupId, GroupEntry>>,
    register_gate: Mutex<()>,
    fetch_gate: Mutex<()>,
}

impl Registry {
    /// Create a registry with default TTL and capacity.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with explicit tuning.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            groups: Mutex::new(HashMap::new()),
            register_gate: Mutex::new(()),
            fetch_gate: Mutex::new(()),
        }
    }

    /// Register `node` into `group`, creating the group if absent.
    ///
    /// Creating the group starts its expiry clock; adding a node to an
    /// existing group does not touch that clock. A repeat registration
    /// is a no-op reported as [`RegisterOutcome::AlreadyExists`].
    pub async fn register(&self, group: &GroupId, node: &NodeId) -> RegisterOutcome {
        let _serial = self.register_gate.lock().await;
        self.register_at(group, node, Instant::now()).await
    }

    /// Membership snapshot for `node` in `group`.
    ///
    /// `None` when the group never existed, has expired, or `node` is
    /// not a member. Never mutates state and never extends expiry.
    pub async fn lookup(&self, group: &GroupId, node: &NodeId) -> Option<GroupSnapshot> {
        let _serial = self.fetch_gate.lock().await;
        self.lookup_at(group, node, Instant::now()).await
    }

    /// Number of unexpired groups, for logging and introspection.
    pub async fn live_groups(&self) -> usize {
        let now = Instant::now();
        let groups = self.groups.lock().await;
        groups
            .values()
            .filter(|entry| !entry.is_expired(self.config.ttl, now))
            .count()
    }

    /// Registration body with an explicit clock. The caller must hold
    /// the register gate (or otherwise guarantee no concurrent
    /// registration).
    async fn register_at(&self, group: &GroupId, node: &NodeId, now: Instant) -> RegisterOutcome {
        // Membership check first, so a repeat registration never touches
        // key material.
        {
            let mut groups = self.groups.lock().await;
            let expired = groups
                .get(group)
                .is_some_and(|entry| entry.is_expired(self.config.ttl, now));
            if expired {
                // Expired identifier being reused: the old entry and
                // everything in it goes away.
                groups.remove(group);
            } else if let Some(entry) = groups.get(group) {
                if entry.members.contains_key(node) {
                    return RegisterOutcome::AlreadyExists;
                }
            }
        }

        // Key generation happens under the register gate but outside the
        // map lock, so lookups are never stalled on the RNG.
        let keys = KeyPair::generate();

        let mut groups = self.groups.lock().await;
        let founded = !groups.contains_key(group);
        if founded {
            Self::purge_expired(&mut groups, self.config.ttl, now);
            if groups.len() >= self.config.max_groups {
                Self::evict_soonest_to_expire(&mut groups);
            }
        }
        let entry = groups
            .entry(group.clone())
            .or_insert_with(|| GroupEntry::new(now));
        entry.members.insert(node.clone(), keys);

        debug!(
            group = %group,
            node = %node,
            members = entry.members.len(),
            founded,
            "node registered"
        );
        RegisterOutcome::Created
    }

    /// Lookup body with an explicit clock.
    async fn lookup_at(&self, group: &GroupId, node: &NodeId, now: Instant) -> Option<GroupSnapshot> {
        let groups = self.groups.lock().await;
        let entry = groups.get(group)?;
        if entry.is_expired(self.config.ttl, now) || !entry.members.contains_key(node) {
            return None;
        }
        Some(GroupSnapshot::of(entry))
    }

    fn purge_expired(groups: &mut HashMap<GroupId, GroupEntry>, ttl: Duration, now: Instant) {
        groups.retain(|group, entry| {
            let live = !entry.is_expired(ttl, now);
            if !live {
                debug!(group = %group, "expired group purged");
            }
            live
        });
    }

    /// Displace the soonest-to-expire entry to make room. Eviction order
    /// is not a contract callers may rely on.
    fn evict_soonest_to_expire(groups: &mut HashMap<GroupId, GroupEntry>) {
        let victim = groups
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(group, _)| group.clone());
        if let Some(victim) = victim {
            warn!(group = %victim, "registry full, evicting soonest-to-expire group");
            groups.remove(&victim);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(group: &str, node: &str) -> (GroupId, NodeId) {
        (GroupId::new(group), NodeId::new(node))
    }

    #[tokio::test]
    async fn first_registration_creates_then_conflicts() {
        let registry = Registry::new();
        let (group, node) = ids("g", "10.1.0.1");

        assert_eq!(registry.register(&group, &node).await, RegisterOutcome::Created);
        assert_eq!(
            registry.register(&group, &node).await,
            RegisterOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn repeat_registration_keeps_credentials() {
        let registry = Registry::new();
        let (group, node) = ids("g", "10.1.0.1");

        registry.register(&group, &node).await;
        let before = registry
            .lookup(&group, &node)
            .await
            .and_then(|s| s.get(&node).map(|k| k.private_base64()))
            .unwrap();

        registry.register(&group, &node).await;
        let after = registry
            .lookup(&group, &node)
            .await
            .and_then(|s| s.get(&node).map(|k| k.private_base64()))
            .unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn joining_does_not_regenerate_peer_credentials() {
        let registry = Registry::new();
        let group = GroupId::new("g");
        let a = NodeId::new("10.1.0.1");
        let b = NodeId::new("10.1.0.2");

        registry.register(&group, &a).await;
        let a_key_before = registry
            .lookup(&group, &a)
            .await
            .and_then(|s| s.get(&a).map(|k| k.public_base64()))
            .unwrap();

        registry.register(&group, &b).await;
        let snapshot = registry.lookup(&group, &a).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&a).unwrap().public_base64(), a_key_before);
    }

    #[tokio::test]
    async fn lookup_is_none_for_unknown_group_or_non_member() {
        let registry = Registry::new();
        let group = GroupId::new("g");
        let member = NodeId::new("10.1.0.1");
        let stranger = NodeId::new("10.9.9.9");

        assert!(registry.lookup(&group, &member).await.is_none());

        registry.register(&group, &member).await;
        assert!(registry.lookup(&group, &member).await.is_some());
        assert!(registry.lookup(&group, &stranger).await.is_none());
    }

    #[tokio::test]
    async fn expiry_is_anchored_to_group_creation() {
        let registry = Registry::new();
        let group = GroupId::new("g");
        let a = NodeId::new("10.1.0.1");
        let b = NodeId::new("10.1.0.2");

        let t0 = Instant::now();
        registry.register_at(&group, &a, t0).await;
        // B joins a minute later; the clock does not reset.
        registry
            .register_at(&group, &b, t0 + Duration::from_secs(60))
            .await;

        let just_before = t0 + Duration::from_secs(299);
        assert!(registry.lookup_at(&group, &a, just_before).await.is_some());
        assert!(registry.lookup_at(&group, &b, just_before).await.is_some());

        let expired = t0 + Duration::from_secs(300);
        assert!(registry.lookup_at(&group, &a, expired).await.is_none());
        assert!(registry.lookup_at(&group, &b, expired).await.is_none());
    }

    #[tokio::test]
    async fn reusing_an_expired_identifier_starts_fresh() {
        let registry = Registry::new();
        let group = GroupId::new("g");
        let a = NodeId::new("10.1.0.1");
        let c = NodeId::new("10.1.0.3");

        let t0 = Instant::now();
        registry.register_at(&group, &a, t0).await;

        // Well past expiry, a new node registers under the same id. The
        // old membership is gone; C founds a new group and gets the full
        // TTL from its own registration.
        let t1 = t0 + Duration::from_secs(400);
        assert_eq!(
            registry.register_at(&group, &c, t1).await,
            RegisterOutcome::Created
        );

        let snapshot = registry.lookup_at(&group, &c, t1).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains(&a));
        assert!(registry
            .lookup_at(&group, &c, t1 + Duration::from_secs(299))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn capacity_bound_evicts_an_existing_group() {
        let registry = Registry::with_config(RegistryConfig {
            ttl: DEFAULT_GROUP_TTL,
            max_groups: 3,
        });
        let node = NodeId::new("10.1.0.1");

        let t0 = Instant::now();
        for (i, name) in ["g1", "g2", "g3"].iter().enumerate() {
            registry
                .register_at(&GroupId::new(*name), &node, t0 + Duration::from_secs(i as u64))
                .await;
        }
        assert_eq!(registry.live_groups().await, 3);

        // A fourth group displaces the oldest one.
        let t1 = t0 + Duration::from_secs(10);
        registry.register_at(&GroupId::new("g4"), &node, t1).await;

        assert_eq!(registry.live_groups().await, 3);
        assert!(registry
            .lookup_at(&GroupId::new("g1"), &node, t1)
            .await
            .is_none());
        assert!(registry
            .lookup_at(&GroupId::new("g4"), &node, t1)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn expired_groups_are_purged_before_eviction() {
        let registry = Registry::with_config(RegistryConfig {
            ttl: Duration::from_secs(300),
            max_groups: 2,
        });
        let node = NodeId::new("10.1.0.1");

        let t0 = Instant::now();
        registry.register_at(&GroupId::new("old"), &node, t0).await;
        registry
            .register_at(&GroupId::new("live"), &node, t0 + Duration::from_secs(200))
            .await;

        // "old" has expired by now, so the new group fits without
        // touching "live".
        let t1 = t0 + Duration::from_secs(350);
        registry.register_at(&GroupId::new("fresh"), &node, t1).await;

        assert!(registry
            .lookup_at(&GroupId::new("live"), &node, t1)
            .await
            .is_some());
        assert!(registry
            .lookup_at(&GroupId::new("fresh"), &node, t1)
            .await
            .is_some());
        assert!(registry
            .lookup_at(&GroupId::new("old"), &node, t1)
            .await
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_registrations_generate_one_credential() {
        let registry = Arc::new(Registry::new());
        let (group, node) = ids("g", "10.1.0.1");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let group = group.clone();
                let node = node.clone();
                tokio::spawn(async move { registry.register(&group, &node).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap() == RegisterOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1, "exactly one racer may win the registration");

        // The surviving credential is the one everyone sees from now on.
        let snapshot = registry.lookup(&group, &node).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        let key = snapshot.get(&node).unwrap().private_base64();

        assert_eq!(
            registry.register(&group, &node).await,
            RegisterOutcome::AlreadyExists
        );
        let snapshot = registry.lookup(&group, &node).await.unwrap();
        assert_eq!(snapshot.get(&node).unwrap().private_base64(), key);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fetches_observe_whole_registrations_only() {
        let registry = Arc::new(Registry::new());
        let (group, node) = ids("g", "10.1.0.1");

        let writer = {
            let registry = Arc::clone(&registry);
            let group = group.clone();
            let node = node.clone();
            tokio::spawn(async move { registry.register(&group, &node).await })
        };

        // Readers racing the founding registration see either nothing or
        // the fully registered member, never a partial entry.
        let readers: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let group = group.clone();
                let node = node.clone();
                tokio::spawn(async move { registry.lookup(&group, &node).await })
            })
            .collect();

        for reader in readers {
            if let Some(snapshot) = reader.await.unwrap() {
                assert_eq!(snapshot.len(), 1);
                assert!(snapshot.get(&node).is_some());
            }
        }
        assert_eq!(writer.await.unwrap(), RegisterOutcome::Created);
    }

    #[tokio::test]
    async fn lookup_never_extends_expiry() {
        let registry = Registry::new();
        let (group, node) = ids("g", "10.1.0.1");

        let t0 = Instant::now();
        registry.register_at(&group, &node, t0).await;

        // Poll right up to the deadline; the deadline does not move.
        for secs in [100, 200, 299] {
            assert!(registry
                .lookup_at(&group, &node, t0 + Duration::from_secs(secs))
                .await
                .is_some());
        }
        assert!(registry
            .lookup_at(&group, &node, t0 + Duration::from_secs(300))
            .await
            .is_none());
    }
}
