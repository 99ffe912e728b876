use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// `None` allows any origin
    pub cors_allowed_origins: Option<Vec<String>>,
    pub request_timeout_secs: u64,
    pub json_logs: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            bind_addr: lookup("BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:3000".to_string())
                .parse()
                .context("BIND_ADDR must be host:port")?,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:constraints.db".to_string()),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").and_then(|raw| {
                let origins: Vec<String> = raw
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty() && o != "*")
                    .collect();
                (!origins.is_empty()).then_some(origins)
            }),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            json_logs: lookup("RUST_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        };

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: "sqlite:constraints.db".to_string(),
            cors_allowed_origins: None,
            request_timeout_secs: 30,
            json_logs: false,
        }
    }
}
