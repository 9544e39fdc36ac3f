//! Catalog Cache - management server for the catalog read cache
//!
//! Boots the cache stores, background sweepers and warmup timers, then serves
//! the management API.
//!
//! This binary owns no catalog data, so it registers no cached routes and no
//! warmup strategies. A catalog service embeds the library instead and installs
//! both on the shared `CacheManager` before building its router (see the
//! crate docs). Run standalone, scheduled warmups are empty and the `queries`
//! warmup mode reports every query as an unknown route.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_cache::api::{create_router, AppState};
use catalog_cache::{CacheManager, Config};

/// Main entry point for the cache management server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache stores and start their sweepers
/// 4. Arm the startup and periodic warmup timers
/// 5. Start HTTP server on configured port
/// 6. Stop timers and destroy stores on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Catalog Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: stores={}, port={}, cleanup_interval={}s, invalidation_delay={}ms",
        config.stores.len(),
        config.server_port,
        config.cleanup_interval,
        config.invalidation_delay_ms
    );

    let manager = Arc::new(CacheManager::from_config(&config));
    manager.start_sweepers(Duration::from_secs(config.cleanup_interval.max(1)));
    info!("Background cleanup tasks started");

    let scheduler = manager.scheduler();
    if scheduler.strategy_names().is_empty() {
        warn!("No warmup strategies registered; scheduled warmups will run empty");
    }
    if config.warmup_on_startup {
        scheduler.schedule_startup(Duration::from_secs(config.warmup_startup_delay));
    }
    if config.warmup_interval_minutes > 0 {
        scheduler.schedule_periodic(config.warmup_interval_minutes)?;
    }

    let state = AppState::from_manager(Arc::clone(&manager));
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
