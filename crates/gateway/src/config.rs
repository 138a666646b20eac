//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GATEWAY_UPSTREAM_ORIGIN` - Origin the gateway fronts (e.g., <https://shop.pomelocommerce.dev>)
//!
//! ## Optional
//! - `GATEWAY_HOST` - Bind address (default: 127.0.0.1)
//! - `GATEWAY_PORT` - Listen port (default: 8080)
//! - `GATEWAY_CACHE_DB` - Path of the cache database (default: pomelo-gateway-cache.db)
//! - `GATEWAY_CACHE_VERSION` - Version embedded in the cache generation name
//!   (default: the crate version)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Gateway application configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// IP address to bind the gateway to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origin the gateway fronts; relative request targets resolve against it
    pub upstream_origin: Url,
    /// Path of the cache database file
    pub cache_db: PathBuf,
    /// Version string embedded in the cache generation name
    pub cache_version: String,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("GATEWAY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GATEWAY_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_PORT".to_string(), e.to_string()))?;

        let upstream_origin = get_required_env("GATEWAY_UPSTREAM_ORIGIN")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("GATEWAY_UPSTREAM_ORIGIN".to_string(), e.to_string())
            })?;

        let cache_db = PathBuf::from(get_env_or_default(
            "GATEWAY_CACHE_DB",
            "pomelo-gateway-cache.db",
        ));
        let cache_version =
            get_env_or_default("GATEWAY_CACHE_VERSION", env!("CARGO_PKG_VERSION"));

        Ok(Self {
            host,
            port,
            upstream_origin,
            cache_db,
            cache_version,
        })
    }

    /// Returns the socket address for binding the gateway.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Name of the cache generation this build serves.
    ///
    /// Embeds the version string; any generation with a different name is
    /// purged on activation.
    #[must_use]
    pub fn generation(&self) -> String {
        format!("pomelo-assets-v{}", self.cache_version)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> GatewayConfig {
        GatewayConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            upstream_origin: "https://shop.example.test".parse().unwrap(),
            cache_db: PathBuf::from("cache.db"),
            cache_version: "0.7.1".to_string(),
        }
    }

    #[test]
    fn test_generation_embeds_version() {
        let config = sample_config();
        assert_eq!(config.generation(), "pomelo-assets-v0.7.1");
    }

    #[test]
    fn test_socket_addr() {
        let config = sample_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }
}
