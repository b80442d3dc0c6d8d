//! Loyalty Core server
//!
//! Wires configuration, logging, the database pool, background sweepers and
//! the HTTP gateway, then runs until interrupted.
//!
//! Exit codes: 0 clean, 1 configuration error, 2 database unreachable,
//! 130 interrupted.

use std::sync::Arc;

use tokio::sync::watch;

use loyalty_core::config::{exit_codes, AppConfig};
use loyalty_core::db::{schema, Database};
use loyalty_core::events::IdempotencyCache;
use loyalty_core::gateway::{self, state::AppState};
use loyalty_core::issuance::reaper;
use loyalty_core::logging;
use loyalty_core::rules::RuleCache;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let _log_guard = logging::init_logging(&config);
    tracing::info!(version = env!("GIT_HASH"), "loyalty core starting");

    let db = match Database::connect(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "database unreachable");
            std::process::exit(exit_codes::DB_UNREACHABLE);
        }
    };

    if let Err(e) = schema::init_schema(db.pool()).await {
        tracing::error!(error = %e, "schema bootstrap failed");
        std::process::exit(exit_codes::DB_UNREACHABLE);
    }

    // Shared caches + cooperative background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let rule_cache = Arc::new(RuleCache::default());
    let idempotency_cache = Arc::new(IdempotencyCache::default());

    let rule_sweeper = rule_cache.clone().spawn_sweeper(shutdown_rx.clone());
    let idem_sweeper = idempotency_cache.clone().spawn_sweeper(shutdown_rx.clone());
    let expiry_reaper = reaper::spawn_reaper(db.pool().clone(), shutdown_rx.clone());

    let state = Arc::new(AppState::new(db, rule_cache, idempotency_cache));

    // Flip the shutdown signal on ctrl-c
    let interrupted = Arc::new(std::sync::atomic::AtomicBool::new(false));
    {
        let shutdown_tx = shutdown_tx.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
                let _ = shutdown_tx.send(true);
            }
        });
    }

    if let Err(e) = gateway::run_server(config.port, state, shutdown_rx).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(exit_codes::DB_UNREACHABLE);
    }

    // Server is down; stop the sweepers and wait for them
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(rule_sweeper, idem_sweeper, expiry_reaper);

    if interrupted.load(std::sync::atomic::Ordering::SeqCst) {
        std::process::exit(exit_codes::INTERRUPTED);
    }
    std::process::exit(exit_codes::OK);
}
