//! API Handlers
//!
//! HTTP request handlers for the admin endpoint.

use std::sync::Arc;

use axum::{extract::State, response::Html, Json};
use tracing::info;

use crate::cache::{build_listeners, PolicyKind, StringCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, SnapshotResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// The store synchronizes internally, so handlers share it through a bare `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StringCache>,
}

impl AppState {
    /// Creates a new AppState with the given cache store.
    pub fn new(cache: StringCache) -> Self {
        Self::from_shared(Arc::new(cache))
    }

    pub fn from_shared(cache: Arc<StringCache>) -> Self {
        Self { cache }
    }

    /// Builds the store described by the configuration.
    ///
    /// Policy, size estimator, snapshot path and listeners all come from
    /// `config`. Nothing is loaded from disk here.
    pub fn from_config(config: &Config) -> Self {
        let cache = StringCache::new(config.capacity_bytes, config.policy)
            .with_boxed_estimator(config.size_estimator.build())
            .with_snapshot_path(&config.snapshot_path);

        for listener in build_listeners(&config.listeners) {
            cache.add_event_listener(listener);
        }
        Self::new(cache)
    }

    fn stats(&self) -> StatsResponse {
        StatsResponse::new(
            self.cache.metrics(),
            self.cache.size(),
            self.cache.current_size_bytes(),
            self.cache.capacity_bytes(),
            self.cache.policy_name(),
        )
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(StringCache::new(1024 * 1024, PolicyKind::default()))
    }
}

/// Handler for GET /admin
///
/// Renders the metrics as a small HTML page.
pub async fn admin_handler(State(state): State<AppState>) -> Html<String> {
    let stats = state.stats();
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Cache metrics</title></head>
<body>
<h1>Cache metrics</h1>
<table>
<tr><th>Hits</th><td id="hits">{}</td></tr>
<tr><th>Misses</th><td id="misses">{}</td></tr>
<tr><th>Evictions</th><td id="evictions">{}</td></tr>
<tr><th>Hit rate</th><td id="hit-rate">{:.2}%</td></tr>
<tr><th>Entries</th><td id="entries">{}</td></tr>
<tr><th>Size</th><td id="size">{} / {} bytes</td></tr>
<tr><th>Policy</th><td id="policy">{}</td></tr>
</table>
</body>
</html>
"#,
        stats.hits,
        stats.misses,
        stats.evictions,
        stats.hit_rate * 100.0,
        stats.entries,
        stats.size_bytes,
        stats.capacity_bytes,
        stats.policy,
    ))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for POST /snapshot
///
/// Writes the current contents to the configured snapshot path.
pub async fn snapshot_handler(State(state): State<AppState>) -> Result<Json<SnapshotResponse>> {
    let cache = Arc::clone(&state.cache);
    let entries = tokio::task::spawn_blocking(move || {
        cache.shutdown()?;
        Ok::<_, CacheError>(cache.size())
    })
    .await
    .map_err(|e| CacheError::persistence("Snapshot task failed", e))??;

    let path = state
        .cache
        .snapshot_path()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    info!("On-demand snapshot of {} entries written to {}", entries, path);

    Ok(Json(SnapshotResponse::new(entries, path)))
}
