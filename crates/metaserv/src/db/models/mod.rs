//! Database models for the metadata catalog.
//!
//! This module contains SQLx-compatible model definitions
//! for all catalog tables.

pub mod catalog;
pub mod user;

pub use catalog::*;
pub use user::*;
