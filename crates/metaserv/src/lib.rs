//! metaserv: metadata catalog for astronomical databases
//!
//! This crate holds the catalog store and the read API:
//!
//! - **Ingestion**: register users and projects, load schema-description
//!   files into the catalog, optionally checked against the live database
//! - **Catalog API**: browse levels, databases, schemas, tables and columns
//!   over HTTP as JSON, HTML or plain text
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: Relational layout, queries and the `MetaStore` handle
//! - [`description`]: Schema-description file parser
//! - [`introspect`]: `information_schema` access and consistency checks
//! - [`services`]: Ingest and catalog services
//! - [`handlers`] and [`routes`]: HTTP surface
//! - [`admin`]: Text command language used by `metactl`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metaserv::{
//!     config::{AppConfig, DatabaseConfig},
//!     db::{create_pool, PgStore},
//!     introspect::PgInspector,
//!     routes::build_router,
//!     services::CatalogService,
//!     state::AppState,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app_config = AppConfig::from_env()?;
//!     let pool = create_pool(&DatabaseConfig::from_env()?).await?;
//!     let store = Arc::new(PgStore::new(pool.clone()));
//!     let catalog = CatalogService::new(store.clone(), Arc::new(PgInspector::new(pool)), "");
//!     let app = build_router(AppState::new(store, app_config), catalog);
//!     // ... serve
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod db;
pub mod description;
pub mod error;
pub mod handlers;
pub mod introspect;
pub mod result_ext;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
