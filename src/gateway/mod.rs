//! HTTP gateway
//!
//! Tenant-scoped JSON API under `/v1`, Swagger UI at `/docs`. Authentication
//! is an external concern: deployments front this surface with their own
//! auth layer (the JWT secret in config passes through untouched).

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let tenant_routes = Router::new()
        // Customers
        .route("/customers", post(handlers::create_customer))
        .route("/customers/{id}", get(handlers::get_customer))
        // Events
        .route("/events", post(handlers::ingest_event))
        // Issuances
        .route("/issuances", get(handlers::list_issuances))
        .route("/issuances/{id}", get(handlers::get_issuance))
        .route("/issuances/{id}/redeem", post(handlers::redeem_issuance))
        .route("/issuances/{id}/cancel", post(handlers::cancel_issuance))
        .route("/issuances/{id}/issue", post(handlers::mark_issuance_issued))
        .route("/issuances/{id}/fail", post(handlers::fail_issuance))
        // Budgets and ledger
        .route("/budgets", post(handlers::create_budget))
        .route("/budgets/{id}", get(handlers::get_budget))
        .route("/budgets/{id}/topup", post(handlers::topup_budget))
        .route("/budgets/{id}/ledger", get(handlers::get_budget_ledger))
        .route("/budgets/{id}/reconcile", post(handlers::reconcile_budget))
        .route(
            "/budgets/{id}/reconcile/fix",
            post(handlers::fix_budget_discrepancy),
        )
        // Rewards and campaigns
        .route("/rewards", post(handlers::create_reward))
        .route("/rewards/{id}", get(handlers::get_reward))
        .route("/campaigns", post(handlers::create_campaign))
        .route("/campaigns/{id}", get(handlers::get_campaign))
        // Rules
        .route("/rules", post(handlers::create_rule).get(handlers::list_rules))
        .route(
            "/rules/{id}",
            get(handlers::get_rule).put(handlers::update_rule),
        )
        .route("/rules/{id}/deactivate", post(handlers::deactivate_rule));

    Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/maintenance/period-reset",
            post(handlers::run_period_reset),
        )
        .route("/v1/tenants", post(handlers::create_tenant))
        .route("/v1/tenants/{tid}", get(handlers::get_tenant))
        .nest("/v1/tenants/{tid}", tenant_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start the HTTP gateway. Resolves when `shutdown` flips to true.
pub async fn run_server(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Gateway listening on http://{addr}");
    tracing::info!("API docs at http://{addr}/docs");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // Either a real shutdown signal or a dropped sender ends the server
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}
