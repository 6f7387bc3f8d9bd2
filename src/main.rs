//! reservation-core server entry point.
//!
//! Starts the Axum HTTP server and the notification outbox dispatcher.

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use reservation_core::api;
use reservation_core::app_state::AppState;
use reservation_core::config::ServiceConfig;
use reservation_core::domain::DiningTable;
use reservation_core::persistence::{MemoryStore, PgStore, ReservationStore};
use reservation_core::service::{LogSender, NotificationDispatcher, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServiceConfig::from_env().context("invalid LISTEN_ADDR")?;
    tracing::info!(addr = %config.listen_addr, "starting reservation-core");

    if config.persistence_enabled {
        let store = PgStore::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        store.migrate().await.context("running migrations")?;
        serve(store, config).await
    } else {
        tracing::warn!("persistence disabled, using the in-memory store");
        serve(MemoryStore::with_tables(dev_tables()), config).await
    }
}

async fn serve<S: ReservationStore>(store: S, config: ServiceConfig) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr;
    let request_timeout = config.request_timeout();
    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        LogSender,
        config.notification_batch_size,
        config.notification_poll_interval(),
    )
    .with_retry(RetryPolicy {
        max_attempts: config.notification_max_attempts,
        base_delay: config.notification_retry_base(),
        ..RetryPolicy::default()
    });

    // Build application state
    let app_state = AppState::new(store, config);
    tokio::spawn(dispatcher.run(app_state.event_bus.subscribe_notifications()));

    // Build router
    let app = Router::new().merge(api::build_router());
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };
    let app = app
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Ten four-seat tables for running without a database.
fn dev_tables() -> Vec<DiningTable> {
    (1..=10)
        .map(|id| DiningTable {
            id,
            code: format!("M-{id:02}"),
            capacity: 4,
            location: None,
            active: true,
        })
        .collect()
}
