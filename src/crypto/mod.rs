//! Title encryption.
//!
//! Titles are encrypted with AES-256-CBC under a random 16-byte IV and stored
//! as `hex(iv) + ":" + hex(ciphertext)`.
//!
//! ```text
//! secret ──normalize──▶ 32-byte key ──▶ TitleCipher   (primary key only)
//!                                     └▶ KeyResolver   (primary, then fallbacks)
//!                                     └▶ ForensicKeySearch (maintenance only)
//! ```

pub mod cipher;
pub mod envelope;
pub mod forensic;
pub mod key;
pub mod resolver;

pub use cipher::TitleCipher;
pub use envelope::Envelope;
pub use forensic::{ForensicHit, ForensicKeySearch};
pub use key::{normalize_secret, NormalizedKey};
pub use resolver::KeyResolver;

/// AES-256 key length in bytes
pub const KEY_SIZE: usize = 32;

/// CBC initialization vector length in bytes
pub const IV_SIZE: usize = 16;

/// Hex length of an encoded IV
pub const IV_HEX_LEN: usize = IV_SIZE * 2;

/// Secret used when none is configured
pub const DEFAULT_SECRET: &str = "catask-default-encryption-key";
