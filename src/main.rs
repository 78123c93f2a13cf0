//! DSR Ledger service
//!
//! ```text
//! config ─▶ logging ─▶ PostgreSQL ─▶ schema
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!      HTTP gateway               export scheduler
//!   (ledger + DSR API)        (claim ─▶ accounting)
//! ```
//!
//! Ctrl-C / SIGTERM stops the gateway (draining requests) and lets the
//! scheduler finish its current cycle before the pool is closed.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use dsr_ledger::config::AppConfig;
use dsr_ledger::db::Database;
use dsr_ledger::export::{ExportScheduler, PgExportStore, SimulatedAccountingClient};
use dsr_ledger::gateway::{self, state::AppState};
use dsr_ledger::ledger::PgLedgerStore;
use dsr_ledger::logging::init_logging;

fn arg_value(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = arg_value(&["--port"]) {
        config.gateway.port = port.parse().context("Invalid --port")?;
    }
    let _log_guard = init_logging(&config);

    info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting dsr_ledger"
    );

    let scheduler_config = config.export.scheduler_config();
    scheduler_config.validate()?;

    let db = Arc::new(
        Database::connect(&config.postgres_url, config.max_connections)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    db.init_schema().await.context("Failed to initialize schema")?;

    let ledger_store = Arc::new(PgLedgerStore::new(db.pool().clone()));
    let export_store = Arc::new(PgExportStore::new(db.pool().clone()));

    // Export scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = ExportScheduler::new(
        export_store.clone(),
        Arc::new(SimulatedAccountingClient::from_config(&config.accounting)),
        scheduler_config,
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    // HTTP gateway
    let state = Arc::new(AppState::new(
        Some(db.clone()),
        ledger_store,
        export_store,
    ));
    let served = gateway::run_server(&config.gateway, state, shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Export scheduler task failed");
    }

    db.close().await;
    served
}
