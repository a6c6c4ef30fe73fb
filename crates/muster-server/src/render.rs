//! WireGuard configuration rendering.
//!
//! A pure projection from a [`MeshPlan`] to the text a node feeds to
//! `wg setconf`: an `[Interface]` section with the node's own address
//! and private key, then one `[Peer]` section per other member.

use std::fmt;

use muster_topology::MeshPlan;

/// UDP port every node listens on inside the mesh.
pub const LISTEN_PORT: u16 = 52435;

/// PersistentKeepalive written for every peer, in seconds.
pub const KEEPALIVE_SECS: u16 = 25;

/// Render a mesh plan as a WireGuard configuration document.
pub fn render_config(plan: &MeshPlan) -> String {
    WireguardConfig(plan).to_string()
}

struct WireguardConfig<'a>(&'a MeshPlan);

impl fmt::Display for WireguardConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.0;
        writeln!(f, "[Interface]")?;
        writeln!(f, "Address = {}", plan.node.address)?;
        writeln!(f, "PrivateKey = {}", plan.node.private_key)?;
        writeln!(f, "ListenPort = {LISTEN_PORT}")?;
        for peer in &plan.peers {
            writeln!(f)?;
            writeln!(f, "[Peer]")?;
            writeln!(f, "Endpoint = {}", peer.endpoint)?;
            writeln!(f, "PublicKey = {}", peer.public_key)?;
            writeln!(f, "AllowedIPs = {}", peer.address)?;
            writeln!(f, "PersistentKeepalive = {KEEPALIVE_SECS}")?;
        }
        Ok(())
    }
}
