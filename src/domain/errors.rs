//! Application error types.
//!
//! Every failure is typed internally (input, permission, downstream API,
//! storage) but all of them serialize to the same JSON envelope at the
//! action boundary.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::domain::repositories::exchange_client::ExchangeError;
use crate::infrastructure::rave_client::RaveError;
use crate::persistence::DatabaseError;
use crate::secrets::SecretError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("You are not logged")]
    NotLogged,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("App currently in demo mode")]
    DemoMode,

    #[error("Args not valid: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Validation(String),

    #[error("{exchange} is not enabled on your account")]
    ExchangeNotEnabled { exchange: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Payment(#[from] RaveError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        AppError::InvalidArgs(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}
