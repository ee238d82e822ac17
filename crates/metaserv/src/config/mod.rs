//! Configuration for the metaserv server and admin tool.
//!
//! Settings come from environment variables, parsed with `envy`.
//! The admin tool can also read connection settings for a target
//! database from a client option file (see [`target`]).

mod app;
mod database;
pub mod target;

pub use app::AppConfig;
pub use database::DatabaseConfig;
pub use target::TargetConfig;
