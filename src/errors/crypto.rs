use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Wrong key, bad padding, undecodable hex, or non UTF-8 output.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Input is not shaped like `IV_HEX:CIPHERTEXT_HEX`. Nothing to decrypt.
    #[error("input is not an encryption envelope")]
    InvalidEnvelope,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
