//! User accounts and authentication.
//!
//! Provides password hashing, session token management, and the
//! [`UserService`] that ties them to user storage.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod service;
pub mod validation;


pub use claims::Claims;
pub use jwt::JwtManager;
pub use service::{NewUser, Session, UserPatch, UserService};
