use std::env;

use anyhow::{Context, Result};

/// Process-level configuration (§9 design note): `data_dir`/`users_dir`
/// are the two on-disk roots §6 names, loaded once at startup with
/// env-var overrides in the style of `trading-agent::config::AgentConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: String,
    pub users_dir: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            users_dir: env::var("USERS_DIR").unwrap_or_else(|_| "./users".to_string()),
        })
        .and_then(|cfg: Self| {
            if cfg.bind_addr.is_empty() {
                anyhow::bail!("BIND_ADDR must not be empty");
            }
            Ok(cfg)
        })
        .context("loading server configuration from environment")
    }
}
