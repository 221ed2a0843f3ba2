use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_api::config::Config;
use live_api::db::kv::{KeyValueStore, MemoryStore};
use live_api::db::notifications::{MemoryNotificationStore, NotificationStore};
use live_api::gateway::tasks::BackgroundTasks;
use live_api::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Env vars may also be set externally; a missing .env is fine.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;
    tracing::info!(?config, "live-api configured");

    // Shared with the auth service, which writes the access tokens.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let notifications: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());

    let state = AppState::new(config, kv, notifications);
    let tasks = BackgroundTasks::spawn(&state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(live_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "live-api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let registry = state.registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            // Open streams never finish on their own; end them so the
            // graceful shutdown can complete.
            let closed = registry.close_all();
            tracing::info!(closed, "shutting down");
        })
        .await?;

    tasks.shutdown().await;
    Ok(())
}
