//! Knowledge Auth Service - Main Application Entry Point
//!
//! API-key authentication and authorization for the knowledge-management
//! service: key issuance, one-time bootstrap of the first admin key,
//! per-request credential validation and permission checks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx, or an in-memory store when no database is configured
//! - **Authentication**: API keys stored as bcrypt hashes
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the key store (Postgres pool + migrations, or in-memory)
//! 3. Build HTTP router with routes and the authentication gate
//! 4. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;
use crate::store::{ApiKeyStore, InMemoryApiKeyStore, PgApiKeyStore};

/// Build the HTTP application.
///
/// Every route sits behind the authentication gate; the gate itself decides
/// which paths are exempt, and handlers add `Authenticated` / `AdminOnly`
/// checks on top.
fn app(state: AppState) -> Router {
    Router::new()
        // Public routes (exempted inside the gate)
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/auth/bootstrap", post(handlers::auth::bootstrap))
        .route("/api/auth/status", get(handlers::auth::status))
        // Authenticated routes
        .route("/api/auth/validate", get(handlers::auth::validate))
        .route(
            "/api/auth/keys",
            post(handlers::api_keys::create_api_key).get(handlers::api_keys::list_api_keys),
        )
        .route(
            "/api/auth/keys/{id}",
            get(handlers::api_keys::get_api_key)
                .put(handlers::api_keys::update_api_key)
                .delete(handlers::api_keys::revoke_api_key),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::auth_middleware,
                )),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let store: Arc<dyn ApiKeyStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Arc::new(PgApiKeyStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; API keys are kept in memory and lost on restart");
            Arc::new(InMemoryApiKeyStore::new())
        }
    };

    let auth = config.auth_settings();
    if !auth.enabled {
        tracing::warn!("API key authentication is DISABLED; every request is let through");
    }
    if auth.bootstrap_secret.is_none() {
        tracing::info!("BOOTSTRAP_SECRET not set; bootstrap endpoint is unavailable");
    }
    tracing::info!(
        enabled = auth.enabled,
        bcrypt_cost = auth.bcrypt_cost,
        "API key authentication configured"
    );

    let app = app(AppState::new(store, auth));

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
