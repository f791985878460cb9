//! # acr-api: HTTP API for AI Compliance Records
//!
//! Exposes the registry, assessment workflow, documentation engine, task
//! deriver and policy tracker of `acr-state` and `acr-governance` over
//! Axum.
//!
//! ## API Surface
//!
//! | Prefix                          | Module                   |
//! |---------------------------------|--------------------------|
//! | `/v1/systems/*`                 | [`routes::systems`]      |
//! | `/v1/systems/:id/assessments`, `/v1/assessments/*` | [`routes::assessments`] |
//! | `/v1/systems/:id/documents/*`, `/v1/documents/*`   | [`routes::documents`]   |
//! | `/v1/systems/:id/tasks/*`       | [`routes::tasks`]        |
//! | `/v1/policies`, `/v1/systems/:id/policies`, `/v1/policy-mappings/*` | [`routes::policies`] |
//! | `/v1/audit`                     | [`routes::audit`]        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## Persistence
//!
//! In-memory stores are authoritative for reads. With `DATABASE_URL` set,
//! every mutation is written through to Postgres and the stores are
//! hydrated on startup.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::systems::router())
        .merge(routes::assessments::router())
        .merge(routes::documents::router())
        .merge(routes::tasks::router())
        .merge(routes::policies::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the stores are hydrated and the router is built.
async fn readiness() -> &'static str {
    "ready"
}
