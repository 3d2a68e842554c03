use crate::config::CryptoConfig;
use crate::errors::{CryptoError, CryptoResult};
use super::cipher::decrypt_with_key;
use super::envelope::{failure_marker, Envelope};
use super::key::{normalize_secret, NormalizedKey};
use super::DEFAULT_SECRET;

/// Upper bound on fallback keys tried per envelope.
pub const MAX_FALLBACK_KEYS: usize = 32;

/// Decrypts envelopes with the primary key, then each historical key in order.
///
/// The candidate list is fixed at construction; `resolve` takes `&self` and
/// can be shared across tasks.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    keys: Vec<NormalizedKey>,
}

impl KeyResolver {
    pub fn new(primary: NormalizedKey, fallbacks: impl IntoIterator<Item = NormalizedKey>) -> Self {
        let mut keys = vec![primary];
        for key in fallbacks {
            if keys.len() > MAX_FALLBACK_KEYS {
                tracing::warn!("Ignoring fallback keys beyond the first {}", MAX_FALLBACK_KEYS);
                break;
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Self { keys }
    }

    /// Primary secret, then configured fallbacks, then the built-in default
    /// (data written by deployments that never set a secret). The default
    /// is kept even when the fallback list is truncated.
    pub fn from_config(config: &CryptoConfig) -> Self {
        let fallbacks = config
            .fallback_secrets
            .iter()
            .map(|secret| normalize_secret(Some(secret)));

        let mut resolver = Self::new(normalize_secret(config.secret.as_deref()), fallbacks);
        let default = normalize_secret(Some(DEFAULT_SECRET));
        if !resolver.keys.contains(&default) {
            resolver.keys.push(default);
        }
        resolver
    }

    pub fn candidates(&self) -> &[NormalizedKey] {
        &self.keys
    }

    /// First plaintext any candidate produces without a cipher error.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidEnvelope`] for input that is not envelope-shaped,
    /// [`CryptoError::DecryptionFailed`] when every candidate fails.
    pub fn resolve(&self, input: &str) -> CryptoResult<String> {
        let envelope = Envelope::parse(input)?;

        for (index, key) in self.keys.iter().enumerate() {
            if let Ok(plaintext) = decrypt_with_key(key, &envelope) {
                if index > 0 {
                    tracing::debug!("Envelope resolved with fallback key #{}", index);
                }
                return Ok(plaintext);
            }
        }

        Err(CryptoError::DecryptionFailed(format!(
            "none of {} candidate keys matched",
            self.keys.len()
        )))
    }

    /// Like [`resolve`](Self::resolve) but never fails: plaintext input comes
    /// back unchanged and undecryptable envelopes come back as a failure marker.
    pub fn resolve_or_marker(&self, input: &str) -> String {
        match self.resolve(input) {
            Ok(plaintext) => plaintext,
            Err(CryptoError::InvalidEnvelope) => input.to_string(),
            Err(CryptoError::DecryptionFailed(_)) => failure_marker(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::encrypt_with_key;
    use crate::crypto::envelope::strip_failure_marker;

    fn key(secret: &str) -> NormalizedKey {
        normalize_secret(Some(secret))
    }

    #[test]
    fn test_primary_key_first() {
        let resolver = KeyResolver::new(key("primary"), vec![key("old")]);
        let envelope = encrypt_with_key(&key("primary"), "Write report");
        assert_eq!(resolver.resolve(&envelope).unwrap(), "Write report");
    }

    // Several blocks long: a wrong key would need valid padding and valid
    // UTF-8 across every block to pass as plaintext.
    const LONG_TITLE: &str = "Call client about the quarterly renewal and the new invoice terms";

    #[test]
    fn test_fallback_key_recovers() {
        let envelope = encrypt_with_key(&key("rotated-2023"), LONG_TITLE);

        let with_fallback = KeyResolver::new(key("primary"), vec![key("typo"), key("rotated-2023")]);
        assert_eq!(with_fallback.resolve(&envelope).unwrap(), LONG_TITLE);

        let without = KeyResolver::new(key("primary"), vec![key("typo")]);
        assert!(matches!(without.resolve(&envelope), Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_all_candidates_fail() {
        let envelope = encrypt_with_key(&key("nobody-knows-this"), LONG_TITLE);
        let resolver = KeyResolver::new(key("primary"), vec![key("old")]);
        assert!(matches!(resolver.resolve(&envelope), Err(CryptoError::DecryptionFailed(_))));
        assert_eq!(
            strip_failure_marker(&resolver.resolve_or_marker(&envelope)),
            Some(envelope.as_str())
        );
    }

    #[test]
    fn test_plaintext_is_invalid_envelope() {
        let resolver = KeyResolver::new(key("primary"), Vec::new());
        assert_eq!(resolver.resolve("Buy milk"), Err(CryptoError::InvalidEnvelope));
        assert_eq!(resolver.resolve_or_marker("Buy milk"), "Buy milk");
    }

    #[test]
    fn test_marker_wraps_unresolved_envelope() {
        let resolver = KeyResolver::new(key("primary"), Vec::new());
        // Valid hex, but block-misaligned: always a cipher failure
        let envelope = format!("{}:{}", "ab".repeat(16), "cd".repeat(17));
        let marked = resolver.resolve_or_marker(&envelope);
        assert_eq!(strip_failure_marker(&marked), Some(envelope.as_str()));
    }

    #[test]
    fn test_candidates_are_bounded_and_unique() {
        let fallbacks = (0..100).map(|i| key(&format!("k{i}")));
        let resolver = KeyResolver::new(key("primary"), fallbacks.chain(std::iter::once(key("primary"))));
        assert!(resolver.candidates().len() <= MAX_FALLBACK_KEYS + 1);

        let resolver = KeyResolver::new(key("primary"), vec![key("primary"), key("old"), key("old")]);
        assert_eq!(resolver.candidates().len(), 2);
    }

    #[test]
    fn test_from_config_includes_default_secret() {
        let config = CryptoConfig {
            enabled: true,
            secret: Some("configured".into()),
            fallback_secrets: vec!["previous".into()],
            forensic_guesses: Vec::new(),
        };
        let envelope = encrypt_with_key(&key(DEFAULT_SECRET), "Feed the cat");
        let resolver = KeyResolver::from_config(&config);

        assert_eq!(resolver.candidates().len(), 3);
        assert_eq!(resolver.resolve(&envelope).unwrap(), "Feed the cat");
    }

    #[test]
    fn test_default_secret_survives_truncation() {
        let config = CryptoConfig {
            enabled: true,
            secret: Some("configured".into()),
            fallback_secrets: (0..100).map(|i| format!("old-{i}")).collect(),
            forensic_guesses: Vec::new(),
        };
        let resolver = KeyResolver::from_config(&config);

        assert_eq!(resolver.candidates().len(), MAX_FALLBACK_KEYS + 2);
        assert_eq!(resolver.candidates().last(), Some(&key(DEFAULT_SECRET)));
        let envelope = encrypt_with_key(&key(DEFAULT_SECRET), LONG_TITLE);
        assert_eq!(resolver.resolve(&envelope).unwrap(), LONG_TITLE);
    }
}
