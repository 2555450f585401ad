//! CI HTTP routes — webhook intake and build history.

pub mod api;
pub mod webhook;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::services::build_service::BuildLedger;
use crate::services::orchestrator::Orchestrator;

/// Shared state for CI route handlers.
#[derive(Clone)]
pub struct CiRouterState {
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<BuildLedger>,
}

/// Build the CI server's Axum router.
pub fn ci_router(state: CiRouterState) -> Router {
    Router::new()
        // Webhook
        .route("/", get(webhook::health).post(webhook::webhook_handler))
        .route(
            "/webhook/github",
            get(webhook::health).post(webhook::webhook_handler),
        )
        // Build history
        .route("/builds", get(api::list_builds_handler))
        .route("/builds/{build_id}", get(api::get_build_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
