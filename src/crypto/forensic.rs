//! Brute-force recovery for titles lost to key mismanagement.
//!
//! This is a maintenance tool. Its acceptance test is a "does this look like
//! text" heuristic and says nothing about authenticity; it must never sit on
//! the normal read path.

use crate::config::CryptoConfig;
use super::cipher::decrypt_with_key;
use super::envelope::Envelope;
use super::key::{normalize_secret, NormalizedKey};
use super::DEFAULT_SECRET;

/// Upper bound on keys tried per envelope.
pub const MAX_FORENSIC_KEYS: usize = 256;

// Low-entropy secrets seen in misconfigured deployments.
const LOW_ENTROPY_GUESSES: &[&str] = &[
    DEFAULT_SECRET,
    "catask",
    "catask-secret-key",
    "catask-encryption-key",
    "encryption-key",
    "encryption_key",
    "your-encryption-key",
    "secret",
    "password",
    "changeme",
    "default",
    "0123456789abcdef0123456789abcdef",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForensicHit {
    /// Decrypted under some candidate key and passed the text heuristic.
    KeySearch(String),
    /// The "ciphertext" bytes were readable text all along.
    RawBytes(String),
}

#[derive(Debug, Clone)]
pub struct ForensicKeySearch {
    keys: Vec<NormalizedKey>,
}

impl ForensicKeySearch {
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut keys: Vec<NormalizedKey> = Vec::new();
        for secret in secrets {
            let key = normalize_secret(Some(&secret));
            if !keys.contains(&key) {
                keys.push(key);
            }
            if keys.len() == MAX_FORENSIC_KEYS {
                break;
            }
        }
        Self { keys }
    }

    /// Every configured secret with common typing variants, the operator's
    /// extra guesses, then the built-in low-entropy list.
    pub fn from_config(config: &CryptoConfig) -> Self {
        let configured = config
            .secret
            .iter()
            .chain(config.fallback_secrets.iter())
            .chain(config.forensic_guesses.iter())
            .flat_map(|secret| secret_variants(secret));

        let guesses = LOW_ENTROPY_GUESSES.iter().map(|s| s.to_string());

        Self::new(configured.chain(guesses))
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Try every key, then the raw bytes. `None` when nothing looks like text.
    pub fn search(&self, envelope_text: &str) -> Option<ForensicHit> {
        let envelope = Envelope::parse(envelope_text).ok()?;

        for key in &self.keys {
            if let Ok(plaintext) = decrypt_with_key(key, &envelope) {
                if looks_like_text(&plaintext) {
                    return Some(ForensicHit::KeySearch(plaintext));
                }
            }
        }

        String::from_utf8(envelope.ciphertext)
            .ok()
            .filter(|raw| looks_like_text(raw))
            .map(ForensicHit::RawBytes)
    }
}

fn secret_variants(secret: &str) -> Vec<String> {
    let trimmed = secret.trim();
    vec![
        secret.to_string(),
        trimmed.to_string(),
        trimmed.to_lowercase(),
        trimmed.to_uppercase(),
        format!("{trimmed}\n"),
        format!("\"{trimmed}\""),
    ]
}

/// Non-empty and every character printable ASCII or common CJK.
pub fn looks_like_text(s: &str) -> bool {
    !s.trim().is_empty() && s.chars().all(is_plausible_char)
}

fn is_plausible_char(c: char) -> bool {
    matches!(c,
        ' '..='~'
        | '\u{3000}'..='\u{303F}'  // CJK punctuation
        | '\u{3040}'..='\u{309F}'  // Hiragana
        | '\u{30A0}'..='\u{30FF}'  // Katakana
        | '\u{4E00}'..='\u{9FFF}'  // CJK unified ideographs
        | '\u{FF00}'..='\u{FFEF}'  // Full-width forms
    )
}
