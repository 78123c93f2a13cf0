//! HTTP gateway
//!
//! Thin axum layer over the ledger and DSR services. Handlers translate
//! JSON to service calls; [`types::ApiError`] is the only place errors
//! become status codes.

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// All routes, with state applied and Swagger UI merged in
pub fn router(state: Arc<AppState>) -> Router {
    let accounts = Router::new()
        .route("/payments", post(handlers::record_payment))
        .route("/payments/transfer", post(handlers::record_transfer))
        .route("/{account_id}/statement", get(handlers::account_statement));

    let dsr = Router::new()
        .route("/preview", post(handlers::preview))
        .route("/export", post(handlers::request_export))
        .route(
            "/exports/{store_id}/{report_date}",
            get(handlers::export_status),
        )
        .route("/accounts/status", patch(handlers::set_account_status))
        .route(
            "/accounts/status/{account_number}",
            get(handlers::get_account_status),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/accounts", accounts)
        .nest("/dsr", dsr)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve until `shutdown` resolves; in-flight requests are drained first
pub async fn run_server<F>(
    config: &GatewayConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API docs: http://{}/docs", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
