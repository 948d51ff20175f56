//! The cryptographic capabilities that protect session tokens.
//!
//! The session id is encrypted so that clients cannot learn anything from it,
//! and the ciphertext is signed so that clients cannot tamper with it.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::anyhow;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Encrypts and decrypts session ids.
pub trait EncryptionProvider: Debug + Send + Sync {
    /// Encrypt `plain_text` into a string that is safe to embed in a token.
    fn encrypt(&self, plain_text: &str) -> anyhow::Result<String>;

    /// Decrypt `cipher_text`.
    /// Returns `None` for anything that was not produced by [`EncryptionProvider::encrypt`] with the same key.
    fn decrypt(&self, cipher_text: &str) -> Option<String>;
}

/// Computes message authentication codes over encrypted session ids.
pub trait HmacProvider: Debug + Send + Sync {
    /// The length in bytes of every code this provider generates.
    fn hmac_length(&self) -> usize;

    /// Compute the code for `data`. The result is always [`HmacProvider::hmac_length`] bytes long.
    fn generate_hmac(&self, data: &str) -> Vec<u8>;
}

/// The length of an AES-256 key in bytes.
pub const AES_KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Encrypts with AES-256-GCM, using a fresh random nonce for every encryption.
///
/// The cipher text is the base64 encoding of the nonce followed by the encrypted data and the authentication tag.
#[allow(missing_copy_implementations)]
pub struct AesGcmEncryptionProvider {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptionProvider {
    /// Create a provider that encrypts with `key`.
    pub fn new(key: &[u8; AES_KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Create a provider with a random key.
    pub fn random() -> Self {
        Self::new(&rand::thread_rng().gen())
    }
}

impl EncryptionProvider for AesGcmEncryptionProvider {
    fn encrypt(&self, plain_text: &str) -> anyhow::Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill(&mut nonce_bytes);

        let encrypted = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plain_text.as_bytes())
            .map_err(|error| anyhow!("AES-GCM encryption failed: {error}"))?;

        let mut result = Vec::with_capacity(NONCE_LENGTH + encrypted.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&encrypted);
        Ok(BASE64.encode(result))
    }

    fn decrypt(&self, cipher_text: &str) -> Option<String> {
        let bytes = BASE64.decode(cipher_text).ok()?;
        if bytes.len() < NONCE_LENGTH + TAG_LENGTH {
            return None;
        }

        let (nonce, encrypted) = bytes.split_at(NONCE_LENGTH);
        let decrypted = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), encrypted)
            .ok()?;
        String::from_utf8(decrypted).ok()
    }
}

impl Debug for AesGcmEncryptionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncryptionProvider")
            .finish_non_exhaustive()
    }
}

/// Does not encrypt at all, the cipher text equals the plain text.
///
/// **This provider is supposed to be used in tests only.**
/// Session ids are still signed, but clients can read them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEncryptionProvider;

impl EncryptionProvider for PassthroughEncryptionProvider {
    fn encrypt(&self, plain_text: &str) -> anyhow::Result<String> {
        Ok(plain_text.to_string())
    }

    fn decrypt(&self, cipher_text: &str) -> Option<String> {
        Some(cipher_text.to_string())
    }
}

/// Signs with the keyed hash mode of blake3.
#[allow(missing_copy_implementations)]
pub struct Blake3HmacProvider {
    key: [u8; blake3::KEY_LEN],
}

impl Blake3HmacProvider {
    /// Create a provider that signs with `key`.
    pub fn new(key: [u8; blake3::KEY_LEN]) -> Self {
        Self { key }
    }

    /// Create a provider with a random key.
    pub fn random() -> Self {
        Self::new(rand::thread_rng().gen())
    }
}

impl HmacProvider for Blake3HmacProvider {
    fn hmac_length(&self) -> usize {
        blake3::OUT_LEN
    }

    fn generate_hmac(&self, data: &str) -> Vec<u8> {
        blake3::keyed_hash(&self.key, data.as_bytes())
            .as_bytes()
            .to_vec()
    }
}

impl Debug for Blake3HmacProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blake3HmacProvider").finish_non_exhaustive()
    }
}

/// The pair of cryptographic providers that protect session tokens.
#[derive(Debug, Clone)]
pub struct CryptographyConfiguration {
    /// Encrypts session ids.
    pub encryption_provider: Arc<dyn EncryptionProvider>,
    /// Signs encrypted session ids.
    pub hmac_provider: Arc<dyn HmacProvider>,
}

impl CryptographyConfiguration {
    /// Combine the given providers.
    pub fn new(
        encryption_provider: Arc<dyn EncryptionProvider>,
        hmac_provider: Arc<dyn HmacProvider>,
    ) -> Self {
        Self {
            encryption_provider,
            hmac_provider,
        }
    }

    /// AES-256-GCM encryption and blake3 signatures with random keys.
    ///
    /// Since the keys only live as long as the process, so do the session tokens.
    pub fn random() -> Self {
        Self::new(
            Arc::new(AesGcmEncryptionProvider::random()),
            Arc::new(Blake3HmacProvider::random()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_gcm_round_trips() {
        let provider = AesGcmEncryptionProvider::random();
        let cipher_text = provider.encrypt("a session id").unwrap();
        assert_ne!(cipher_text, "a session id");
        assert_eq!(provider.decrypt(&cipher_text).as_deref(), Some("a session id"));
    }

    #[test]
    fn aes_gcm_uses_a_fresh_nonce_per_encryption() {
        let provider = AesGcmEncryptionProvider::random();
        assert_ne!(
            provider.encrypt("same").unwrap(),
            provider.encrypt("same").unwrap()
        );
    }

    #[test]
    fn aes_gcm_rejects_foreign_and_malformed_cipher_texts() {
        let provider = AesGcmEncryptionProvider::new(&[1; AES_KEY_LENGTH]);
        let other = AesGcmEncryptionProvider::new(&[2; AES_KEY_LENGTH]);
        let cipher_text = other.encrypt("secret").unwrap();

        assert_eq!(provider.decrypt(&cipher_text), None);
        assert_eq!(provider.decrypt("not base64!"), None);
        assert_eq!(provider.decrypt(""), None);
        assert_eq!(provider.decrypt(&BASE64.encode([0u8; 8])), None);
    }

    #[test]
    fn blake3_signatures_depend_on_key_and_data() {
        let provider = Blake3HmacProvider::new([7; blake3::KEY_LEN]);
        let signature = provider.generate_hmac("data");
        assert_eq!(signature.len(), provider.hmac_length());
        assert_eq!(signature, provider.generate_hmac("data"));
        assert_ne!(signature, provider.generate_hmac("other data"));
        assert_ne!(
            signature,
            Blake3HmacProvider::new([8; blake3::KEY_LEN]).generate_hmac("data")
        );
    }
}
