//! metaserv server
//!
//! Serves the read-only catalog API over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metaserv::{
    config::{AppConfig, DatabaseConfig},
    db::{create_pool, init_schema, schema::missing_tables, PgStore},
    introspect::PgInspector,
    routes::build_router,
    services::CatalogService,
    state::AppState,
};

/// Initialize tracing/logging.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,metaserv=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load app config, using defaults: {}", e);
        AppConfig::default()
    });

    init_tracing(app_config.log_json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting metaserv");

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        debug = app_config.debug,
        public_url = %app_config.public_url,
        "Configuration loaded"
    );

    let db_pool = create_pool(&db_config).await?;

    if app_config.init_schema {
        init_schema(&db_pool).await?;
    } else {
        let missing = missing_tables(&db_pool).await?;
        if !missing.is_empty() {
            tracing::warn!(?missing, "Catalog tables missing; run `metactl init`");
        }
    }

    // `/schema` introspects the source database; fall back to the store.
    let source_pool = match DatabaseConfig::source_from_env()? {
        Some(source_config) => create_pool(&source_config).await?,
        None => db_pool.clone(),
    };

    let store = Arc::new(PgStore::new(db_pool));
    let catalog = CatalogService::new(
        store.clone(),
        Arc::new(PgInspector::new(source_pool)),
        app_config.base_url(),
    );
    let state = AppState::new(store, app_config.clone());

    let app = build_router(state, catalog);

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
