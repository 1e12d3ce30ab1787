//! Configuration loading.
//!
//! Settings come from an optional TOML file, then PostgreSQL connection
//! values are overridden from the environment (`POSTGRES_HOST`,
//! `POSTGRES_PORT`, `POSTGRES_DB`, `POSTGRES_USER`, `POSTGRES_PASSWORD`).
//! Every field has a default suitable for local development only.
//!
//! ```toml
//! [db]
//! host = "127.0.0.1"
//! port = 5432
//! name = "csvdb"
//!
//! [ingest]
//! batch_size = 5000
//!
//! [search]
//! max_page_size = 500
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_db_name(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "csvdb".to_string()
}
fn default_user() -> String {
    "postgres".to_string()
}
fn default_password() -> String {
    "postgres".to_string()
}
fn default_max_connections() -> u32 {
    20
}
fn default_acquire_timeout_secs() -> u64 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Rows per transactional insert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Trim whitespace around unquoted cell values.
    #[serde(default = "default_trim")]
    pub trim: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            trim: default_trim(),
        }
    }
}

fn default_batch_size() -> usize {
    5000
}
fn default_trim() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> i64 {
    50
}
fn default_max_page_size() -> i64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_max_upload_bytes() -> usize {
    1 << 30
}

impl Config {
    /// Override database settings from an environment lookup.
    ///
    /// Unset variables keep the current value. A variable that is set but
    /// empty is treated as missing.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Some(v) if v.trim().is_empty() => Err(ConfigError::MissingEnv(name.to_string())),
                other => Ok(other),
            }
        };

        if let Some(host) = var("POSTGRES_HOST")? {
            self.db.host = host;
        }
        if let Some(port) = var("POSTGRES_PORT")? {
            self.db.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "POSTGRES_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(name) = var("POSTGRES_DB")? {
            self.db.name = name;
        }
        if let Some(user) = var("POSTGRES_USER")? {
            self.db.user = user;
        }
        if let Some(password) = var("POSTGRES_PASSWORD")? {
            self.db.password = password;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db.host.is_empty() {
            return Err(ConfigError::Invalid("db.host must not be empty".into()));
        }
        if self.db.max_connections == 0 {
            return Err(ConfigError::Invalid("db.max_connections must be > 0".into()));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Invalid("ingest.batch_size must be > 0".into()));
        }
        if self.search.max_page_size < 1 {
            return Err(ConfigError::Invalid("search.max_page_size must be >= 1".into()));
        }
        if !(1..=self.search.max_page_size).contains(&self.search.default_page_size) {
            return Err(ConfigError::Invalid(
                "search.default_page_size must be in [1, search.max_page_size]".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from `path` (if given), then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: PathBuf::from(path),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}
