//! Process configuration, read once at startup from the environment
//! (`.env` is loaded by the binary before this runs).

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Absent means classification is disabled; tickets are created
    /// unclassified.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);
        let webhook_url = env::var("CLASSIFIER_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.is_empty());
        let timeout_secs = env::var("CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT_SECS);

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig { url },
            classifier: ClassifierConfig {
                webhook_url,
                timeout_secs,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
