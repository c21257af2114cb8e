mod auth;
mod config;
mod db;
mod errors;
mod events;
mod models;
mod nlp_client;
mod queue;
mod quota;
mod realtime;
mod repos;
mod routes;
mod state;
mod storage;
mod workers;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::db::create_pool;
use crate::events::EventBus;
use crate::nlp_client::NlpClient;
use crate::queue::QueueGateway;
use crate::realtime::RealtimeHub;
use crate::repos::Repositories;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::ObjectStore;
use crate::workers::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SkillSync API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config).await?;

    // Initialize queue broker
    let queue = QueueGateway::connect(
        &config.redis_url,
        config.queue_max_attempts,
        Duration::from_millis(config.queue_retry_base_ms),
    )
    .await?;

    // Initialize object storage
    let storage = ObjectStore::from_config(&config).await;
    info!(
        "Object storage client initialized (bucket {}, account {})",
        config.r2_bucket, config.r2_account_id
    );

    // Initialize NLP client
    let nlp = NlpClient::new(
        config.python_service_url.clone(),
        Duration::from_millis(config.nlp_connect_timeout_ms),
        Duration::from_millis(config.nlp_request_timeout_ms),
    );
    info!("NLP client initialized ({})", config.python_service_url);

    // Domain event bus and realtime hub
    let events = EventBus::new(256);
    let realtime = RealtimeHub::new();

    let auth = Authenticator::from_config(&config)?;

    let state = AppState {
        repos: Repositories::new(pool, events.clone()),
        queue,
        storage,
        nlp,
        events,
        realtime,
        auth,
        config: config.clone(),
    };

    // Start queue consumers and the bus → websocket bridge. Both are
    // idempotent: consumers are guarded by the pool's started flag and the
    // bridge listeners by their registration tags.
    WorkerPool::new().start(&state).await?;
    realtime::bridge::register_listeners(&state);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, draining connections");
}
