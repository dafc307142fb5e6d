//! Dialog Fiber server
//!
//! Serves the profile bot over HTTP, persisting dialog stacks in SQLite.

use dialog_fiber::api::{create_router, AppState};
use dialog_fiber::store::{Database, SqliteStore};
use dialog_fiber::{demo, ConversationManager, EngineConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialog_fiber=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = EngineConfig::from_env();

    // Initialize database
    let db = if config.in_memory() {
        tracing::warn!("Using an in-memory database, conversations will not survive a restart");
        Database::open_in_memory()?
    } else {
        if let Some(parent) = PathBuf::from(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %config.db_path, "Opening database");
        Database::open(&config.db_path)?
    };
    let store = Arc::new(SqliteStore::new(db));

    let registry = Arc::new(demo::registry());
    let dispatcher = Arc::new(demo::dispatcher(config.score_traits)?);
    tracing::info!(
        dialogs = ?registry.kinds(),
        globals = ?dispatcher.global_names(),
        max_drive_steps = config.max_drive_steps,
        "Engine initialized"
    );

    let manager = ConversationManager::new(
        store,
        registry,
        demo::root(),
        dispatcher,
        config.max_drive_steps,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(manager))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Dialog fiber server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
