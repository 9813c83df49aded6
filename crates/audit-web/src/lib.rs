//! Audit Sync Web Server
//!
//! Axum-based REST API for reconciliation runs, coverage and drift.

pub mod routes;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use audit_graph::Reconciler;

use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Runs
        .route("/reconcile", post(routes::runs::reconcile))
        .route("/runs", get(routes::runs::list_runs))
        .route("/runs/{id}", get(routes::runs::get_run))
        // Coverage
        .route("/coverage/{standard_id}", get(routes::coverage::control_coverage))
        .route(
            "/coverage/{standard_id}/summary",
            get(routes::coverage::coverage_summary),
        )
        .route("/projection", get(routes::coverage::projection))
        // Drift
        .route("/drift", get(routes::drift::drift));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until `shutdown` fires.
pub async fn run_server(
    reconciler: Reconciler,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(AppState::new(reconciler));

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
