//! Runtime configuration, resolved from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::auth::TokenIssuer;
use crate::sync::DEFAULT_MAX_BATCH;

pub(crate) const ENV_DB: &str = "LEDGERSYNC_DB";
pub(crate) const ENV_BIND: &str = "LEDGERSYNC_BIND";
pub(crate) const ENV_SECRET: &str = "LEDGERSYNC_SECRET";
pub(crate) const ENV_TOKEN_TTL_HOURS: &str = "LEDGERSYNC_TOKEN_TTL_HOURS";
pub(crate) const ENV_MAX_BATCH: &str = "LEDGERSYNC_MAX_BATCH";

/// Shortest accepted signing secret, in bytes.
pub(crate) const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub(crate) struct Config {
    /// Database file. `None` means the per-user data directory.
    pub db_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub secret: Option<Vec<u8>>,
    pub token_ttl_hours: i64,
    pub max_batch: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("bind_addr", &self.bind_addr)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("max_batch", &self.max_batch)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            secret: None,
            token_ttl_hours: 24 * 30,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_DB).filter(|s| !s.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup(ENV_BIND) {
            config.bind_addr = bind
                .parse()
                .with_context(|| format!("{ENV_BIND} is not a socket address: {bind}"))?;
        }
        if let Some(secret) = lookup(ENV_SECRET).filter(|s| !s.is_empty()) {
            config.secret = Some(secret.into_bytes());
        }
        if let Some(hours) = lookup(ENV_TOKEN_TTL_HOURS) {
            config.token_ttl_hours = hours
                .parse()
                .with_context(|| format!("{ENV_TOKEN_TTL_HOURS} is not a number: {hours}"))?;
            if config.token_ttl_hours <= 0 {
                bail!("{ENV_TOKEN_TTL_HOURS} must be positive");
            }
        }
        if let Some(max) = lookup(ENV_MAX_BATCH) {
            config.max_batch = max
                .parse()
                .with_context(|| format!("{ENV_MAX_BATCH} is not a number: {max}"))?;
            if config.max_batch == 0 {
                bail!("{ENV_MAX_BATCH} must be positive");
            }
        }
        Ok(config)
    }

    pub(crate) fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    pub(crate) fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub(crate) fn with_secret(mut self, secret: Vec<u8>) -> Self {
        self.secret = Some(secret);
        self
    }

    /// The configured database file, or `ledgersync.db` in the platform data
    /// directory (created if missing).
    pub(crate) fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let proj_dirs = directories::ProjectDirs::from("com", "ledgersync", "LedgerSync")
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Ok(data_dir.join("ledgersync.db"))
    }

    pub(crate) fn token_issuer(&self) -> Result<TokenIssuer> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| anyhow!("{ENV_SECRET} must be set to issue or verify tokens"))?;
        if secret.len() < MIN_SECRET_LEN {
            bail!("{ENV_SECRET} must be at least {MIN_SECRET_LEN} bytes");
        }
        TokenIssuer::new(secret, chrono::Duration::hours(self.token_ttl_hours))
            .map_err(|e| anyhow!("invalid signing secret: {e}"))
    }
}
