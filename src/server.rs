use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::handler::{
        deposit, get_contract, health_check, list_active_contracts, list_unpaid_jobs, pay_job,
        AppState,
    },
    middleware::{create_cors_layer, resolve_profile, settlement_rate_limit},
};

pub async fn create_app(state: AppState, request_timeout: Duration) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    // Money-moving routes get the per-profile rate limit on top of auth
    let settlement_routes = Router::new()
        .route("/jobs/:job_id/pay", post(pay_job))
        .route("/balances/deposit/:user_id", post(deposit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            settlement_rate_limit,
        ));

    // Everything except /health sits behind profile resolution. route_layer
    // only wraps matched routes, so unknown paths still answer a plain 404.
    let authed_routes = Router::new()
        .route("/contracts/:id", get(get_contract))
        .route("/contracts", get(list_active_contracts))
        .route("/jobs/unpaid", get(list_unpaid_jobs))
        .merge(settlement_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_profile,
        ));

    // Build the application router with all routes and middleware
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(authed_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .layer(create_cors_layer())
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
