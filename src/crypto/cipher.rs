//! AES-256-CBC encryption of a single title.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};

use crate::config::CryptoConfig;
use crate::errors::{CryptoError, CryptoResult};
use super::envelope::{self, Envelope};
use super::key::{normalize_secret, NormalizedKey};
use super::IV_SIZE;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt under `key` with a fresh random IV and return the envelope text.
pub(crate) fn encrypt_with_key(key: &NormalizedKey, plaintext: &str) -> String {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let key_bytes = *key.as_bytes();
    let ciphertext = Aes256CbcEnc::new(&key_bytes.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Envelope { iv, ciphertext }.encode()
}

/// Decrypt a parsed envelope under `key`.
///
/// A wrong key usually fails the padding check, but not always; a success
/// here only means the bytes unpadded cleanly and are valid UTF-8.
pub(crate) fn decrypt_with_key(key: &NormalizedKey, envelope: &Envelope) -> CryptoResult<String> {
    if envelope.ciphertext.is_empty() || envelope.ciphertext.len() % IV_SIZE != 0 {
        return Err(CryptoError::DecryptionFailed("ciphertext is not block aligned".into()));
    }

    let key_bytes = *key.as_bytes();
    let plaintext = Aes256CbcDec::new(&key_bytes.into(), &envelope.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("bad padding".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailed("plaintext is not UTF-8".into()))
}

/// Encrypts and decrypts titles under the primary key.
#[derive(Debug, Clone)]
pub struct TitleCipher {
    key: NormalizedKey,
    enabled: bool,
}

impl TitleCipher {
    pub fn new(key: NormalizedKey, enabled: bool) -> Self {
        Self { key, enabled }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(normalize_secret(config.secret.as_deref()), config.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the envelope for `plaintext`.
    ///
    /// Identity when encryption is disabled or when the input is already a
    /// well-formed envelope.
    pub fn encrypt(&self, plaintext: &str) -> String {
        if !self.enabled || envelope::is_well_formed(plaintext) {
            return plaintext.to_string();
        }
        encrypt_with_key(&self.key, plaintext)
    }

    /// Decrypts under the primary key. Input that is not envelope-shaped is
    /// returned unchanged in both modes, so legacy plaintext passes through.
    pub fn decrypt(&self, input: &str) -> CryptoResult<String> {
        match Envelope::parse(input) {
            Ok(parsed) => decrypt_with_key(&self.key, &parsed),
            Err(CryptoError::InvalidEnvelope) => Ok(input.to_string()),
            Err(err) => Err(err),
        }
    }
}
