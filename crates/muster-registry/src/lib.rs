//! Muster Group Registry
//!
//! The expiring membership store behind Muster's mesh coordination.
//! Groups are created implicitly when the first node registers under an
//! identifier, every node registers at most once (repeat registrations
//! never regenerate credentials), and the whole group expires a fixed
//! interval after creation regardless of later joins.
//!
//! Concurrency discipline is owned here, not by callers: all
//! registrations are serialized on one gate, all fetch lookups on
//! another, and the group map itself sits behind its own lock so either
//! side only ever observes whole registrations.

mod group;
mod keys;
mod registry;

pub use group::{GroupId, GroupSnapshot, NodeId};
pub use keys::KeyPair;
pub use registry::{
    RegisterOutcome, Registry, RegistryConfig, DEFAULT_GROUP_TTL, DEFAULT_MAX_GROUPS,
};
