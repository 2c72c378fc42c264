//! Server configuration parsed from environment variables.
//!
//! Every setting has a default; only a malformed bind address is an error.
//! `BIND_ADDR` is an IP address (v4 or v6, brackets optional) and `PORT`
//! is applied separately.
//! Numeric values that fail to parse fall back to their default, and
//! channel capacities are clamped to at least one.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::coordinator::{DEFAULT_COORDINATOR_QUEUE_CAPACITY, DEFAULT_HISTORY_TIMEOUT_MS};
use crate::frame::ErrorCode;
use crate::services::persistence::{
    DEFAULT_PERSIST_QUEUE_CAPACITY, DEFAULT_PERSIST_RETRIES, DEFAULT_PERSIST_RETRY_BASE_MS, PersistConfig,
};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_OUTBOUND_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_SESSIONS_PAGE_SIZE: i64 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {addr}: {source}")]
    InvalidBindAddr { addr: String, source: AddrParseError },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBindAddr { .. } => "E_CONFIG_BIND_ADDR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Postgres URL; `None` runs on the in-memory action log.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Per-connection outbound frame queue.
    pub outbound_capacity: usize,
    pub coordinator_queue_capacity: usize,
    /// Upper bound on one join's history read.
    pub history_timeout_ms: u64,
    pub persist: PersistConfig,
    /// Default `pageSize` for `GET /api/sessions`.
    pub sessions_page_size: i64,
    /// Directory served for non-API paths, if any.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT` (3000), `BIND_ADDR` (0.0.0.0)
    /// - `DATABASE_URL`, `DB_MAX_CONNECTIONS` (5)
    /// - `OUTBOUND_CHANNEL_CAPACITY` (256), `COORDINATOR_QUEUE_CAPACITY` (1024)
    /// - `HISTORY_TIMEOUT_MS` (5000)
    /// - `ACTION_PERSIST_QUEUE_CAPACITY` (8192), `ACTION_PERSIST_RETRIES` (2),
    ///   `ACTION_PERSIST_RETRY_BASE_MS` (20)
    /// - `SESSIONS_PAGE_SIZE` (6), `STATIC_DIR`
    ///
    /// # Errors
    ///
    /// Returns `InvalidBindAddr` if `BIND_ADDR` is not an IP address.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBindAddr` if `BIND_ADDR` is not an IP address.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = non_empty(lookup("BIND_ADDR")).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let ip: IpAddr = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr { addr: host.clone(), source })?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT);
        let bind_addr = SocketAddr::new(ip, port);

        let persist = PersistConfig {
            queue_capacity: parse_or(&lookup, "ACTION_PERSIST_QUEUE_CAPACITY", DEFAULT_PERSIST_QUEUE_CAPACITY).max(1),
            retries: parse_or(&lookup, "ACTION_PERSIST_RETRIES", DEFAULT_PERSIST_RETRIES),
            retry_base_ms: parse_or(&lookup, "ACTION_PERSIST_RETRY_BASE_MS", DEFAULT_PERSIST_RETRY_BASE_MS),
        };

        Ok(Self {
            bind_addr,
            database_url: non_empty(lookup("DATABASE_URL")),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1),
            outbound_capacity: parse_or(&lookup, "OUTBOUND_CHANNEL_CAPACITY", DEFAULT_OUTBOUND_CHANNEL_CAPACITY).max(1),
            coordinator_queue_capacity: parse_or(
                &lookup,
                "COORDINATOR_QUEUE_CAPACITY",
                DEFAULT_COORDINATOR_QUEUE_CAPACITY,
            )
            .max(1),
            history_timeout_ms: parse_or(&lookup, "HISTORY_TIMEOUT_MS", DEFAULT_HISTORY_TIMEOUT_MS).max(1),
            persist,
            sessions_page_size: parse_or(&lookup, "SESSIONS_PAGE_SIZE", DEFAULT_SESSIONS_PAGE_SIZE).max(1),
            static_dir: non_empty(lookup("STATIC_DIR")).map(PathBuf::from),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            outbound_capacity: DEFAULT_OUTBOUND_CHANNEL_CAPACITY,
            coordinator_queue_capacity: DEFAULT_COORDINATOR_QUEUE_CAPACITY,
            history_timeout_ms: DEFAULT_HISTORY_TIMEOUT_MS,
            persist: PersistConfig::default(),
            sessions_page_size: DEFAULT_SESSIONS_PAGE_SIZE,
            static_dir: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
