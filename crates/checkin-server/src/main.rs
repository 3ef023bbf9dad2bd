//! Event check-in server.
//!
//! Serves the scan and stats endpoints over HTTP, backed either by the hosted
//! database or by an in-process store for local runs.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use checkin_core::auth::{CachedSessions, StaticSessions};
use checkin_core::{
    realtime, Backend, ChangeBus, Config, DatabaseClient, EventStore, MemoryCache, MemoryStore,
    Repository, ScanService, SessionProvider,
};
use checkin_server::{router, AppState};

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "checkin.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

type Backends = (Arc<dyn EventStore>, Arc<dyn SessionProvider>);

fn build_backends(config: &Config, bus: &ChangeBus) -> Result<Backends> {
    match config.backend {
        Backend::Hosted => {
            let url = config.database_url.as_deref().context("SUPABASE_URL is not set")?;
            let service_key = config
                .service_key
                .as_deref()
                .context("SUPABASE_SERVICE_ROLE_KEY is not set")?;
            let anon_key = config.anon_key.as_deref().context("SUPABASE_ANON_KEY is not set")?;

            let client = DatabaseClient::new(
                url,
                service_key,
                anon_key,
                config.request_timeout(),
                bus.clone(),
            )?;
            info!(url, "Using hosted database");
            let store: Arc<dyn EventStore> = Arc::new(client.clone());
            let sessions: Arc<dyn SessionProvider> = Arc::new(CachedSessions::new(client));
            Ok((store, sessions))
        }
        Backend::Memory => {
            let sessions = StaticSessions::parse(config.dev_tokens.as_deref().unwrap_or_default());
            if sessions.is_empty() {
                warn!("No CHECKIN_DEV_TOKENS configured; every scan will be rejected as unauthorized");
            }
            info!(tokens = sessions.len(), "Using in-memory store");
            let store: Arc<dyn EventStore> = Arc::new(MemoryStore::new(bus.clone()));
            let sessions: Arc<dyn SessionProvider> = Arc::new(sessions);
            Ok((store, sessions))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(backend = ?config.backend, "Check-in server starting");

    let bus = ChangeBus::new();
    let cache = Arc::new(MemoryCache::new());
    let (store, sessions) = build_backends(&config, &bus)?;
    let _invalidators = realtime::spawn_invalidators(cache.clone(), &bus);

    let repo = Repository::new(store, cache);
    let state = AppState::new(ScanService::new(repo), sessions);
    let app = router(state, config.static_dir.as_deref());

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Check-in server shut down");
    Ok(())
}
