//! Muster Server - ephemeral WireGuard mesh coordination over HTTP.
//!
//! Nodes that share a group identifier register themselves (identified
//! by their source address) and, once the whole party has joined, fetch
//! a complete WireGuard configuration: their own private key and mesh
//! address plus every other member as a peer. Groups expire as a whole
//! a fixed interval after creation.
//!
//! # Architecture
//!
//! - **Registry**: expiring group membership store (`muster-registry`)
//! - **Topology**: deterministic rank/address assignment (`muster-topology`)
//! - **API**: plain-text HTTP endpoints for register and fetch
//! - **Render**: WireGuard configuration document rendering

pub mod api;
pub mod auth;
pub mod error;
pub mod render;
pub mod server;

pub use api::{build_router, AppState};
pub use error::{Error, Result};
pub use server::{Server, ServerConfig};
