use std::fmt;

use super::{DEFAULT_SECRET, KEY_SIZE};

/// A 256-bit key derived from a configured secret.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedKey([u8; KEY_SIZE]);

impl NormalizedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NormalizedKey(..)")
    }
}

/// Derive an exact-length key from a secret.
///
/// Short secrets are repeated onto themselves until the key is full, long
/// ones are truncated. A missing or empty secret is replaced by
/// [`DEFAULT_SECRET`] first. Lengths are measured in UTF-8 bytes.
pub fn normalize_secret(secret: Option<&str>) -> NormalizedKey {
    let secret = secret.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SECRET);
    let bytes = secret.as_bytes();

    let mut key = [0u8; KEY_SIZE];
    for (i, slot) in key.iter_mut().enumerate() {
        *slot = bytes[i % bytes.len()];
    }
    NormalizedKey(key)
}
