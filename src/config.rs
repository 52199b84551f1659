//! Configuration types.
//!
//! Everything is read from the environment once at startup and passed down
//! explicitly; nothing reads environment variables after that.

use std::net::SocketAddr;

use crate::channels::transport::MailConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
/// Default request body limit for the webhook (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the webhook server binds to.
    pub bind_addr: SocketAddr,
    /// Largest inbound request body accepted, attachments included.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: "BIND_ADDR".into(),
            message: format!("{raw:?} is not a socket address: {e}"),
        })?;

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            bind_addr,
            max_upload_bytes,
        })
    }
}

/// Whole-service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` when no API key is set: summaries use the local heuristic.
    pub llm: Option<LlmConfig>,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            llm: LlmConfig::from_env(),
            mail: MailConfig::from_env()?,
        })
    }
}
