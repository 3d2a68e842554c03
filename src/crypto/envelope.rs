//! The `IV_HEX:CIPHERTEXT_HEX` envelope and the failure markers that wrap
//! envelopes nobody could decrypt.

use std::borrow::Cow;

use crate::errors::{CryptoError, CryptoResult};
use super::{IV_HEX_LEN, IV_SIZE};

/// Prefix written in place of a title whose envelope could not be decrypted.
pub const UNDECRYPTABLE_PREFIX: &str = "[undecryptable]";

/// Older spelling of the same marker, still found in stored documents.
pub const DECRYPTION_ERROR_PREFIX: &str = "[decryption error]";

const MARKER_PREFIXES: [&str; 2] = [UNDECRYPTABLE_PREFIX, DECRYPTION_ERROR_PREFIX];

// Bounds for the lenient shape check on the read path.
const MIN_DAMAGED_IV_HEX: usize = 16;
const MAX_DAMAGED_IV_HEX: usize = 64;
const MIN_CIPHERTEXT_HEX: usize = IV_SIZE * 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn encode(&self) -> String {
        format!("{}:{}", hex::encode(self.iv), hex::encode(&self.ciphertext))
    }

    /// Parse an envelope, repairing an IV segment of the wrong length.
    ///
    /// A long IV is truncated to 32 hex characters and a short one is padded
    /// with `0`. This only rescues historically damaged documents; a repaired
    /// IV usually still fails to decrypt the first block correctly.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidEnvelope`] when the input is not envelope-shaped,
    /// [`CryptoError::DecryptionFailed`] when the ciphertext hex is undecodable.
    pub fn parse(input: &str) -> CryptoResult<Self> {
        if !looks_like_envelope(input) {
            return Err(CryptoError::InvalidEnvelope);
        }
        let (iv_hex, ciphertext_hex) = input.split_once(':').ok_or(CryptoError::InvalidEnvelope)?;

        let iv_hex = repair_iv_hex(iv_hex);
        let mut iv = [0u8; IV_SIZE];
        hex::decode_to_slice(iv_hex.as_bytes(), &mut iv)
            .map_err(|e| CryptoError::DecryptionFailed(format!("iv: {e}")))?;

        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| CryptoError::DecryptionFailed(format!("ciphertext: {e}")))?;

        Ok(Self { iv, ciphertext })
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn repair_iv_hex(iv_hex: &str) -> Cow<'_, str> {
    match iv_hex.len() {
        IV_HEX_LEN => Cow::Borrowed(iv_hex),
        len if len > IV_HEX_LEN => Cow::Borrowed(&iv_hex[..IV_HEX_LEN]),
        _ => Cow::Owned(format!("{:0<width$}", iv_hex, width = IV_HEX_LEN)),
    }
}

/// Strict check: a 32-hex IV and block-aligned ciphertext, exactly what
/// [`Envelope::encode`] produces. Used to avoid encrypting twice.
pub fn is_well_formed(input: &str) -> bool {
    match input.split_once(':') {
        Some((iv, ciphertext)) => {
            iv.len() == IV_HEX_LEN
                && is_hex(iv)
                && is_hex(ciphertext)
                && ciphertext.len() % (IV_SIZE * 2) == 0
        }
        None => false,
    }
}

/// Lenient check used on reads so damaged IVs still reach [`Envelope::parse`].
pub fn looks_like_envelope(input: &str) -> bool {
    match input.split_once(':') {
        Some((iv, ciphertext)) => {
            (MIN_DAMAGED_IV_HEX..=MAX_DAMAGED_IV_HEX).contains(&iv.len())
                && is_hex(iv)
                && ciphertext.len() >= MIN_CIPHERTEXT_HEX
                && is_hex(ciphertext)
        }
        None => false,
    }
}

/// Wrap an envelope nobody could decrypt.
pub fn failure_marker(envelope: &str) -> String {
    format!("{UNDECRYPTABLE_PREFIX} {envelope}")
}

/// If `title` is a failure marker, return the text it wraps (possibly empty).
pub fn strip_failure_marker(title: &str) -> Option<&str> {
    MARKER_PREFIXES
        .iter()
        .find_map(|prefix| title.strip_prefix(prefix))
        .map(str::trim)
}
