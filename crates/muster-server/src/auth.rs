//! Request authentication and source identification.
//!
//! Both run before the registry is touched: a request with a bad token
//! never reaches it, and the extracted source address is the node's
//! identity within its group.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use muster_registry::NodeId;

/// Header carrying the shared secret.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Header set by a fronting proxy with the original client address.
pub const FORWARDED_HEADER: &str = "x-forwarded-for";

/// Compare the shared-secret header against the configured token.
pub fn token_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false)
}

/// Node identity for a request.
///
/// The first `X-Forwarded-For` hop wins when a proxy provides one
/// (the reference deployment runs behind one); otherwise the connecting
/// peer address is used. Ports are never part of the identity.
pub fn source_address(headers: &HeaderMap, peer: SocketAddr) -> NodeId {
    if let Some(forwarded) = headers
        .get(FORWARDED_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return NodeId::new(first);
            }
        }
    }
    NodeId::new(peer.ip().to_string())
}
