//! acbank server entry point.
//!
//! Opens the store pool, runs migrations, and starts the Axum HTTP server
//! with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use acbank::api;
use acbank::app_state::AppState;
use acbank::config::{AppConfig, LogFormat};
use acbank::domain::{EventBus, RateLimiter};
use acbank::service::AuthLimits;
use acbank::store::{PgConnector, StorePool};
use acbank::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting acbank");

    // Open the store pool eagerly so a bad DATABASE_URL fails at startup
    let pool = Arc::new(StorePool::new(
        PgConnector::new(config.database_url.clone()),
        config.pool.clone(),
    ));
    pool.initialize()
        .await
        .context("failed to open the initial store connections")?;

    let mut conn = pool.acquire().await?;
    let migrated = sqlx::migrate!("./migrations").run(&mut *conn).await;
    pool.release(conn).await;
    migrated.context("failed to run database migrations")?;

    // Build domain layer
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_events,
        config.rate_limit_window,
    ));
    let sweeper = limiter.spawn_sweeper(config.rate_limit_sweep_interval);
    let auth_limits = AuthLimits::new(config.login_max_per_minute, config.register_max_per_minute);
    let auth_sweepers = auth_limits.spawn_sweepers(config.rate_limit_sweep_interval);
    let event_bus = EventBus::new(config.event_subscriber_buffer);

    // Build application state
    let app_state = AppState::new(Arc::clone(&pool), limiter, auth_limits, event_bus);

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        app.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    for handle in auth_sweepers {
        handle.abort();
    }
    pool.shutdown().await;
    tracing::info!("acbank stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
