//! Musterd binary
//!
//! Coordination point for ephemeral WireGuard meshes: nodes register
//! under a shared group id and fetch their config once everyone is in.

use muster_server::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musterd=info,muster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Musterd");

    let config = ServerConfig::from_env()?;
    let server = Server::new(config);
    server.run().await?;

    Ok(())
}
