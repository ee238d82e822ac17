//! HTTP handlers for the metaserv API.

pub mod db;
pub mod health;
pub mod negotiate;

pub use health::{api_health, health_check};
pub use negotiate::{Reply, Representation};
