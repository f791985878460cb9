//! # acr-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use anyhow::Context;

use acr_api::state::{AppConfig, AppState};
use acr_core::RulesetCatalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(?config, "configuration loaded");

    let rulesets = match &config.ruleset_path {
        Some(path) => {
            let catalog = RulesetCatalog::load(path)
                .with_context(|| format!("loading ruleset catalog from {}", path.display()))?;
            tracing::info!(path = %path.display(), ?catalog, "ruleset catalog loaded");
            catalog
        }
        None => RulesetCatalog::default(),
    };

    // Optional: absent DATABASE_URL means in-memory only.
    let db_pool = acr_api::db::init_pool().await.map_err(|e| {
        tracing::error!("database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let state = AppState::with_config(config, rulesets, db_pool);
    state
        .hydrate_from_db()
        .await
        .map_err(|e| anyhow::anyhow!("database hydration failed: {e}"))?;

    let app = acr_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("AI compliance records API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; filtering follows `RUST_LOG`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
