//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::cache::{EstimatorKind, PolicyKind};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache capacity in estimated bytes
    pub capacity_bytes: u64,
    pub policy: PolicyKind,
    pub size_estimator: EstimatorKind,
    /// Built-in listener names to register at startup
    pub listeners: Vec<String>,
    /// RESP server port
    pub server_port: u16,
    /// Admin HTTP port
    pub admin_port: u16,
    pub snapshot_path: PathBuf,
    /// Restore the snapshot at startup if the file exists
    pub load_on_start: bool,
    /// Periodic snapshot interval in seconds, 0 disables it
    pub snapshot_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_BYTES` - Capacity in bytes (default: 1048576)
    /// - `CACHE_POLICY` - `lru` or `lfu` (default: lru)
    /// - `CACHE_SIZE_ESTIMATOR` - `text` or `serialized` (default: text)
    /// - `CACHE_LISTENERS` - Comma-separated listener names (default: logging)
    /// - `SERVER_PORT` - RESP server port (default: 6379)
    /// - `ADMIN_PORT` - Admin HTTP port (default: 8080)
    /// - `SNAPSHOT_PATH` - Snapshot file (default: cache.dat)
    /// - `LOAD_ON_START` - Restore the snapshot at startup (default: true)
    /// - `SNAPSHOT_INTERVAL` - Seconds between snapshots, 0 = off (default: 0)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            capacity_bytes: parse_or(&lookup, "CACHE_CAPACITY_BYTES", defaults.capacity_bytes),
            policy: parse_or(&lookup, "CACHE_POLICY", defaults.policy),
            size_estimator: parse_or(&lookup, "CACHE_SIZE_ESTIMATOR", defaults.size_estimator),
            listeners: lookup("CACHE_LISTENERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.listeners),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port),
            admin_port: parse_or(&lookup, "ADMIN_PORT", defaults.admin_port),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            load_on_start: parse_or(&lookup, "LOAD_ON_START", defaults.load_on_start),
            snapshot_interval: parse_or(&lookup, "SNAPSHOT_INTERVAL", defaults.snapshot_interval),
        }
    }
}

/// Parses `name`, keeping `default` when it is unset or invalid.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value '{}' for {}", raw, name);
            default
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_bytes: 1024 * 1024,
            policy: PolicyKind::Lru,
            size_estimator: EstimatorKind::Text,
            listeners: vec!["logging".to_string()],
            server_port: 6379,
            admin_port: 8080,
            snapshot_path: PathBuf::from("cache.dat"),
            load_on_start: true,
            snapshot_interval: 0,
        }
    }
}
