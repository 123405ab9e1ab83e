//! Cache Machine - A size-bounded in-memory cache server
//!
//! Runs the RESP server and the admin endpoint over one shared cache.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_machine::api::create_router;
use cache_machine::{spawn_snapshot_task, AppState, Config, RespServer};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache store and register listeners
/// 4. Restore the snapshot if configured and present, moving an unreadable
///    one aside
/// 5. Start the RESP server and the admin HTTP server
/// 6. Start the periodic snapshot task if an interval is set
/// 7. On SIGINT/SIGTERM, stop both servers and persist the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_machine=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cache Machine v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={} bytes, policy={}, estimator={}, port={}, admin_port={}, snapshot={}",
        config.capacity_bytes,
        config.policy,
        config.size_estimator.as_str(),
        config.server_port,
        config.admin_port,
        config.snapshot_path.display()
    );

    let state = AppState::from_config(&config);
    let cache = Arc::clone(&state.cache);

    // Cleared when an unreadable snapshot could not be moved aside, so no
    // automatic write replaces the only copy.
    let mut persist_on_exit = true;
    if config.load_on_start && cache.has_snapshot_on_disk() {
        match cache.load_from_disk() {
            Ok(count) => info!("Loaded {} entries from snapshot", count),
            Err(e) => {
                warn!("Starting empty, snapshot could not be loaded: {}", e);
                if let Err(e) = cache.quarantine_snapshot() {
                    error!("Snapshot left in place, persist on exit disabled: {}", e);
                    persist_on_exit = false;
                }
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let resp_addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let resp_server = RespServer::bind(resp_addr, Arc::clone(&cache))
        .await
        .with_context(|| format!("failed to bind RESP server on {}", resp_addr))?;
    let resp_handle = tokio::spawn(resp_server.run(wait_for_shutdown(shutdown_rx.clone())));

    let admin_addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("failed to bind admin server on {}", admin_addr))?;
    info!("Admin server listening on http://{}/admin", admin_addr);
    let admin_rx = shutdown_rx.clone();
    let admin_handle = tokio::spawn(async move {
        axum::serve(admin_listener, create_router(state))
            .with_graceful_shutdown(wait_for_shutdown(admin_rx))
            .await
    });

    let snapshot_handle = (persist_on_exit && config.snapshot_interval > 0)
        .then(|| spawn_snapshot_task(Arc::clone(&cache), config.snapshot_interval));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Some(handle) = snapshot_handle {
        handle.abort();
        warn!("Snapshot task aborted");
    }
    if let Err(e) = resp_handle.await {
        error!("RESP server task failed: {}", e);
    }
    match admin_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Admin server error: {}", e),
        Err(e) => error!("Admin server task failed: {}", e),
    }

    if persist_on_exit {
        let persisted = tokio::task::spawn_blocking(move || cache.shutdown()).await?;
        if let Err(e) = persisted {
            error!("Failed to persist cache on shutdown: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves once the shutdown flag flips to true.
fn wait_for_shutdown(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> {
    async move {
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
