//! Query functions for the catalog store, organized by table group.
//!
//! Inserts take a `&mut PgConnection` so they can run inside the ingest
//! transaction; reads go straight to the pool.

pub mod catalog;
pub mod user;
