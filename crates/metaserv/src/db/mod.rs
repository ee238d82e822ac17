//! Database module for the metadata catalog.
//!
//! This module provides connectivity, the relational layout, row models,
//! query functions, and the `MetaStore` handle the services work through.

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;
pub mod store;

pub use pool::{create_pool, DbPool};
pub use schema::init_schema;
pub use store::{MetaStore, PgStore};
