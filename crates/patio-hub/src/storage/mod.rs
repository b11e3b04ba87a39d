//! SQLite storage for the Patio hub.
//!
//! Provides persistence for devices (with their embedded schedule and
//! authorized users) and user accounts.

mod db;
mod models;
mod queries_devices;
mod queries_users;
mod store;


pub use db::HubDatabase;
pub use models::*;
pub use patio_core::db::DatabaseError;
pub use store::ConfigStore;
