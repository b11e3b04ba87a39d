//! Patio Hub Library
//!
//! Core functionality for the Patio device hub:
//! - SQLite storage for devices, their schedules and user accounts
//! - Identifier resolution (MAC or email natural keys, surrogate ids)
//! - Schedule validation
//! - Configuration sync: write, notify over RabbitMQ, revert on failure
//! - User accounts, password hashing and session tokens

pub mod auth;
pub mod cli;
pub mod devices;
pub mod error;
pub mod identity;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{Error, Result};
