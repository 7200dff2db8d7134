//! Pool configuration: code, TOML and environment sources.

use crate::dialect::Dialect;
use crate::pool::{DbPoolError, SqlxPool};
use serde::Deserialize;
use sqlx::any::AnyPoolOptions;
use std::path::Path;
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "TXSCOPE_DATABASE_URL";
pub const ENV_FALLBACK_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "TXSCOPE_MAX_CONNECTIONS";
pub const ENV_MIN_CONNECTIONS: &str = "TXSCOPE_MIN_CONNECTIONS";
pub const ENV_ACQUIRE_TIMEOUT_SECS: &str = "TXSCOPE_ACQUIRE_TIMEOUT_SECS";

/// Settings used to build a [`SqlxPool`].
///
/// Example `txscope.toml`:
/// ```toml
/// url = "postgres://shop@localhost/shop"
/// max_connections = 20
/// acquire_timeout_secs = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: None,
        }
    }
}

impl PoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self, DbPoolError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DbPoolError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Read the process environment.
    ///
    /// `TXSCOPE_DATABASE_URL` wins over `DATABASE_URL`; the numeric variables
    /// override the defaults when present.
    pub fn from_env() -> Result<Self, DbPoolError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`PoolConfig::from_env`] with a custom variable lookup.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbPoolError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_DATABASE_URL).or_else(|| lookup(ENV_FALLBACK_DATABASE_URL)) {
            config.url = url;
        }
        if let Some(max) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_number(ENV_MAX_CONNECTIONS, &max)?;
        }
        if let Some(min) = lookup(ENV_MIN_CONNECTIONS) {
            config.min_connections = parse_number(ENV_MIN_CONNECTIONS, &min)?;
        }
        if let Some(secs) = lookup(ENV_ACQUIRE_TIMEOUT_SECS) {
            config.acquire_timeout_secs = parse_number(ENV_ACQUIRE_TIMEOUT_SECS, &secs)?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DbPoolError> {
        if self.url.trim().is_empty() {
            return Err(DbPoolError::Configuration("database URL is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(DbPoolError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DbPoolError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }

    pub fn dialect(&self) -> Result<Dialect, DbPoolError> {
        Dialect::from_url(&self.url)
    }

    /// Validate the settings and open the pool.
    pub async fn connect(&self) -> Result<SqlxPool, DbPoolError> {
        self.validate()?;
        let dialect = self.dialect()?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(self.idle_timeout_secs.map(Duration::from_secs))
            .connect(&self.url)
            .await
            .map_err(DbPoolError::Connection)?;

        tracing::info!(
            txscope.db.dialect = ?dialect,
            txscope.db.max_connections = self.max_connections,
            "Connection pool ready"
        );
        Ok(SqlxPool::from_pool(pool, dialect))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, DbPoolError> {
    raw.trim()
        .parse()
        .map_err(|_| DbPoolError::Configuration(format!("{key} must be a number, got {raw:?}")))
}
