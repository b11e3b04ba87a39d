//! Error taxonomy for the hub.
//!
//! Every fallible core operation returns [`Error`]. Kinds are never
//! downgraded on the way out: a failed revert stays [`Error::OutOfSync`] all
//! the way to the caller.

use patio_core::db::DatabaseError;

use crate::notify::NotificationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad identifier, schedule, name, email or password. Raised before any
    /// side effect.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Storage fault: {0}")]
    StorageFault(String),

    /// Publish failed and the stored configuration was reverted.
    #[error("Notification fault: {0}")]
    NotificationFault(String),

    /// A change failed after it may have been stored, and so did the
    /// revert. The stored configuration was never delivered to the device.
    #[error("Device {device} is out of sync: {cause}; revert failed ({revert})")]
    OutOfSync {
        device: String,
        cause: String,
        revert: String,
    },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Hashing or token signing failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status an outer layer should answer with for this kind.
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::AuthenticationFailed => 401,
            Self::AuthorizationFailed(_) => 403,
            Self::NotFound(_) => 404,
            Self::DuplicateKey(_) => 409,
            Self::StorageFault(_) | Self::NotificationFault(_) => 502,
            Self::OutOfSync { .. } | Self::Internal(_) => 500,
        }
    }

    /// Only [`Error::OutOfSync`] needs an operator.
    pub const fn needs_operator(&self) -> bool {
        matches!(self, Self::OutOfSync { .. })
    }
}

impl From<DatabaseError> for Error {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::DuplicateKey(what) => Self::DuplicateKey(what),
            other => Self::StorageFault(other.to_string()),
        }
    }
}

impl From<NotificationError> for Error {
    fn from(e: NotificationError) -> Self {
        Self::NotificationFault(e.to_string())
    }
}
