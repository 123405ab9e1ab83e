//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Current number of entries in cache
    pub entries: usize,
    /// Estimated bytes held
    pub size_bytes: u64,
    pub capacity_bytes: u64,
    /// Eviction policy name
    pub policy: String,
}

impl StatsResponse {
    pub fn new(
        stats: CacheStats,
        entries: usize,
        size_bytes: u64,
        capacity_bytes: u64,
        policy: impl Into<String>,
    ) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
            entries,
            size_bytes,
            capacity_bytes,
            policy: policy.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for an on-demand snapshot (POST /snapshot)
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub message: String,
    /// Entries held when the snapshot was taken
    pub entries: usize,
    pub path: String,
}

impl SnapshotResponse {
    pub fn new(entries: usize, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("Snapshot written to {}", path),
            entries,
            path,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
