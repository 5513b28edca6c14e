mod admission;
mod api;
mod backend;
mod config;
mod dispatch;
mod error;
mod expiry;
mod rate_limit;
mod session;
mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::backend::MemoryBackend;
use crate::config::ServerConfig;
use crate::expiry::ExpiryMap;
use crate::rate_limit::RateLimiter;
use crate::session::SessionRegistry;
use crate::stats::Stats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tern_server=debug")),
        )
        .init();

    info!("Starting tern IM server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        forbid_register = config.forbid_register,
        forbid_token = config.forbid_token,
        tls = config.tls_enabled(),
        "Policy settings"
    );

    let sessions = Arc::new(SessionRegistry::new());
    let expiry = Arc::new(ExpiryMap::new());
    let limiter = RateLimiter::new(config.hertz);
    let backend = Arc::new(MemoryBackend::new(&config.salt, sessions.clone()));

    let state = AppState {
        config: Arc::new(config),
        stats: Arc::new(Stats::default()),
        sessions,
        expiry: expiry.clone(),
        limiter: limiter.clone(),
        backend,
        closed: Arc::new(AtomicBool::new(false)),
    };

    let _reaper = expiry::spawn_reaper(expiry);

    // Rate limiter cleanup every 5 min, evict buckets idle >10 min
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.purge_stale(600.0).await;
        }
    });

    tokio::select! {
        result = api::serve(state.clone()) => {
            if let Err(e) = result {
                error!(error = %e, "listener failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            state.closed.store(true, Ordering::SeqCst);
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
