//! Service layer for the metadata catalog.
//!
//! Services hold the store handle and carry the rules that sit between
//! handlers or admin commands and the query layer.

pub mod catalog;
pub mod ingest;

pub use catalog::CatalogService;
pub use ingest::{IngestService, LoadCatalogRequest};
