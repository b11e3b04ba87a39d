//! `Patio` Core Library
//!
//! Shared functionality for `Patio` components:
//! - Layered configuration and secret resolution
//! - `SQLite` pool helpers and the shared `DatabaseError`
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{Config, Secret};
pub use error::{Error, Result};
