use thiserror::Error;
use redis::RedisError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Malformed user document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("User not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
