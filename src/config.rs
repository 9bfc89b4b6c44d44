//! Typed configuration from environment variables.
//!
//! Loads once at startup. Everything has a default; only malformed values
//! are rejected.

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub service_name: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let service_name =
            std::env::var("SERIALQ_SERVICE_NAME").unwrap_or_else(|_| "serialq".to_string());
        if service_name.trim().is_empty() {
            return Err(Error::Config(
                "SERIALQ_SERVICE_NAME must not be empty".to_string(),
            ));
        }

        Ok(Self {
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            service_name,
        })
    }
}

/// Unset and blank are both treated as absent.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
