//! Server assembly: configuration from the environment and the run
//! loop binding the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use muster_registry::{Registry, RegistryConfig, DEFAULT_GROUP_TTL, DEFAULT_MAX_GROUPS};

use crate::api::{self, AppState};
use crate::error::{Error, Result};

/// Fallback token used when `MUSTER_TOKEN` is unset.
pub const DEFAULT_TOKEN: &str = "testing";

/// Configuration for a Muster server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address
    pub listen_addr: SocketAddr,

    /// Shared secret expected in the `X-Auth-Token` header
    pub token: String,

    /// Registry tuning (group TTL, capacity bound)
    pub registry: RegistryConfig,
}

impl ServerConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// `MUSTER_LISTEN_ADDR` (default `0.0.0.0:8080`), `MUSTER_TOKEN`
    /// (default `"testing"`, with a warning), `MUSTER_GROUP_TTL_SECS`
    /// (default 300) and `MUSTER_MAX_GROUPS` (default 100). A variable
    /// that is set but malformed fails with [`Error::Config`].
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_or("MUSTER_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .map_err(|e| Error::Config(format!("invalid MUSTER_LISTEN_ADDR: {e}")))?;

        let token = match std::env::var("MUSTER_TOKEN") {
            Ok(token) if !token.is_empty() => token,
            _ => {
                tracing::warn!(
                    "MUSTER_TOKEN is not set, using {:?} as X-Auth-Token",
                    DEFAULT_TOKEN
                );
                DEFAULT_TOKEN.to_string()
            }
        };

        let ttl_secs: u64 = env_parsed("MUSTER_GROUP_TTL_SECS", DEFAULT_GROUP_TTL.as_secs())?;
        let max_groups: usize = env_parsed("MUSTER_MAX_GROUPS", DEFAULT_MAX_GROUPS)?;

        Ok(Self {
            listen_addr,
            token,
            registry: RegistryConfig {
                ttl: Duration::from_secs(ttl_secs),
                max_groups,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an env var, defaulting when unset. A value that is set but
/// does not parse is a configuration error, not a silent fallback.
fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// A Muster server instance.
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    /// Assemble a server from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let state = Arc::new(AppState {
            registry: Registry::with_config(config.registry),
            token: config.token.clone(),
        });
        Self { config, state }
    }

    /// Shared state (for tests and embedding).
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Bind the listener and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Muster server starting");
        tracing::info!("  HTTP: http://{}", self.config.listen_addr);
        tracing::info!(
            "  Group TTL: {}s, max groups: {}",
            self.config.registry.ttl.as_secs(),
            self.config.registry.max_groups
        );

        let app = api::build_router(self.state)
            .into_make_service_with_connect_info::<SocketAddr>();

        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.listen_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
