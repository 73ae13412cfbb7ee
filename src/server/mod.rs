use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::Config;
use crate::streaming::{start_sweep_task, ConnectionPool, StreamSettings};
use crate::upstream::HttpSourceFactory;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use reelstream_db::pool::init_pool;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod error;
pub mod request_id;
pub mod routes_bundles;
pub mod routes_stream;

use auth::TokenAuthority;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Stream token validation
    pub tokens: TokenAuthority,
    /// Upstream connections and their cached handles
    pub pool: Arc<ConnectionPool>,
    pub catalog: Arc<dyn Catalog>,
    pub settings: Arc<StreamSettings>,
}

impl AppContext {
    pub fn new(config: Config, pool: Arc<ConnectionPool>, catalog: Arc<dyn Catalog>) -> Self {
        let tokens = TokenAuthority::new(config.stream.token_secret.clone());
        let settings = Arc::new(StreamSettings::from(&config.stream));
        Self {
            config: Arc::new(config),
            tokens,
            pool,
            catalog,
            settings,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    // Players send Range first and need to read the range headers back
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
            header::CONTENT_DISPOSITION,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .merge(routes_stream::stream_routes())
        .merge(routes_bundles::bundle_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": ctx.pool.connection_count(),
        "cached_handles": ctx.pool.cached_handles(),
    }))
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let db_path = config.database.resolved_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Opening catalog database at {}", db_path_str);
    let db_pool = init_pool(&db_path_str)?;
    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db_pool));

    if config.upstream.connections.is_empty() {
        tracing::warn!("No upstream connections configured; every stream will get 503");
    }
    let factory = Arc::new(HttpSourceFactory::new(config.upstream.connections.clone()));
    let pool = Arc::new(ConnectionPool::new(factory, config.stream.handle_ttl()));

    let cancel = CancellationToken::new();
    let sweeper = start_sweep_task(
        Arc::clone(&pool),
        config.stream.sweep_interval(),
        cancel.clone(),
    );

    let ctx = AppContext::new(config, pool, catalog);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Handle sweep task ended abnormally: {}", e);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
