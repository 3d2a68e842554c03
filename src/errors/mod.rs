// Error taxonomy for the service. Cryptographic failures are resolved
// locally and never reach a client; storage failures always do.
use thiserror::Error;

pub mod crypto;
pub mod response;
pub mod store;

pub use crypto::{CryptoError, CryptoResult};
pub use store::{StoreError, StoreResult};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Version conflict: expected {expected}, stored {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    // A failed write surfaces here; the caller must treat the save as not committed.
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Session error: {0}")]
    Session(String),
}

pub type AppResult<T> = Result<T, AppError>;
