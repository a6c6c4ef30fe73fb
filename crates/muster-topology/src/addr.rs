//! Rank to mesh address mapping.

use std::net::Ipv4Addr;

/// Base of the private range mesh addresses are carved from.
pub const MESH_PREFIX: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);

/// Address for a 1-based rank: the prefix plus the rank.
///
/// Computed with u32 arithmetic, so rank 1 is 10.0.0.1 and a rank past
/// 255 spills into the adjacent /24 instead of wrapping.
pub fn mesh_address(rank: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(MESH_PREFIX) + rank)
}
