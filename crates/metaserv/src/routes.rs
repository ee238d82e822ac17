//! HTTP route table.

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::services::CatalogService;
use crate::state::AppState;

/// Build the application router. All catalog routes are read-only.
pub fn build_router(state: AppState, catalog: CatalogService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health))
        .with_state(state);

    let catalog_routes = Router::new()
        .route("/", get(handlers::db::root))
        .route("/db", get(handlers::db::list_levels))
        .route("/db/{level}", get(handlers::db::list_databases))
        .route("/db/{level}/{db}", get(handlers::db::get_database))
        .route("/db/{level}/{db}/schemas", get(handlers::db::list_schemas))
        .route("/db/{level}/{db}/tables", get(handlers::db::list_tables))
        .route(
            "/db/{level}/{db}/tables/{table}",
            get(handlers::db::get_table),
        )
        .route(
            "/db/{level}/{db}/tables/{table}/schema",
            get(handlers::db::get_table_schema),
        )
        .with_state(catalog);

    Router::new()
        .merge(health_routes)
        .merge(catalog_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
