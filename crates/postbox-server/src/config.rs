use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "memory" | "kv" => Ok(BackendKind::Memory),
            other => bail!("Unknown POSTBOX_BACKEND '{}', expected 'sqlite' or 'memory'", other),
        }
    }
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub db_path: PathBuf,
    /// Base64 AES-256 key. `None` stores secrets and bodies as given.
    pub encryption_key: Option<String>,
    pub lock_timeout: Duration,
    pub seed: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = var_or("POSTBOX_PORT", "8080")
            .parse()
            .context("POSTBOX_PORT must be a port number")?;
        let backend = var_or("POSTBOX_BACKEND", "sqlite").parse()?;
        let lock_timeout_ms: u64 = var_or("POSTBOX_LOCK_TIMEOUT_MS", "2000")
            .parse()
            .context("POSTBOX_LOCK_TIMEOUT_MS must be an integer")?;
        let seed = matches!(
            var_or("POSTBOX_SEED", "false").to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        Ok(Self {
            host: var_or("POSTBOX_HOST", "0.0.0.0"),
            port,
            backend,
            db_path: var_or("POSTBOX_DB_PATH", "postbox.db").into(),
            encryption_key: env::var("POSTBOX_ENCRYPTION_KEY").ok().filter(|k| !k.is_empty()),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            seed,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}
