//! Secret parameter encryption
//!
//! Encrypted adaptor parameters are stored as `base64(nonce || ciphertext || tag)`.
//! The keystream is the BLAKE3 keyed XOF of a random 16-byte nonce. The tag
//! is a keyed BLAKE3 hash of nonce and ciphertext under a second key, so a
//! value encrypted under another runner secret, or altered in storage, fails
//! to decrypt instead of yielding garbage.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use crate::adaptor::config::ConfigError;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = blake3::OUT_LEN;

const STREAM_CONTEXT: &str = "waves 2024 adaptor secret keystream";
const TAG_CONTEXT: &str = "waves 2024 adaptor secret tag";

/// Length of the runner secret key, in bytes
pub const KEY_LEN: usize = 32;

/// Symmetric cipher for adaptor secrets
#[derive(Clone)]
pub struct Cipher {
    stream_key: [u8; KEY_LEN],
    tag_key: [u8; KEY_LEN],
}

impl Cipher {
    /// Creates a cipher from a 32-character secret key
    pub fn from_key(key: &str) -> Result<Self, ConfigError> {
        let bytes: [u8; KEY_LEN] = key
            .as_bytes()
            .try_into()
            .map_err(|_| ConfigError::InvalidKey(key.len()))?;
        Ok(Self::with_key(&bytes))
    }

    /// Creates a cipher with a random key, valid for this process only
    pub fn random() -> Self {
        Self::with_key(&rand::random::<[u8; KEY_LEN]>())
    }

    fn with_key(key: &[u8; KEY_LEN]) -> Self {
        Self {
            stream_key: blake3::derive_key(STREAM_CONTEXT, key),
            tag_key: blake3::derive_key(TAG_CONTEXT, key),
        }
    }

    pub fn encrypt(&self, plaintext: &SecretString) -> String {
        let nonce = rand::random::<[u8; NONCE_LEN]>();
        let mut data = plaintext.expose_secret().as_bytes().to_vec();
        self.apply_keystream(&nonce, &mut data);

        let mut out = Vec::with_capacity(NONCE_LEN + data.len() + TAG_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&data);
        let tag = self.tag(&out);
        out.extend_from_slice(tag.as_bytes());
        STANDARD.encode(out)
    }

    pub fn decrypt(&self, encoded: &str) -> Result<SecretString, ConfigError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ConfigError::Decrypt)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(ConfigError::Decrypt);
        }

        let (sealed, tag) = raw.split_at(raw.len() - TAG_LEN);
        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| ConfigError::Decrypt)?;
        // blake3::Hash equality is constant time
        if self.tag(sealed) != blake3::Hash::from_bytes(tag) {
            return Err(ConfigError::Decrypt);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let mut data = ciphertext.to_vec();
        self.apply_keystream(nonce, &mut data);

        let plaintext = String::from_utf8(data).map_err(|_| ConfigError::Decrypt)?;
        Ok(SecretString::from(plaintext))
    }

    fn tag(&self, sealed: &[u8]) -> blake3::Hash {
        blake3::keyed_hash(&self.tag_key, sealed)
    }

    fn apply_keystream(&self, nonce: &[u8], data: &mut [u8]) {
        let mut hasher = blake3::Hasher::new_keyed(&self.stream_key);
        hasher.update(nonce);
        let mut keystream = vec![0u8; data.len()];
        hasher.finalize_xof().fill(&mut keystream);

        for (byte, k) in data.iter_mut().zip(keystream) {
            *byte ^= k;
        }
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_decrypt_restores_plaintext() {
        let cipher = Cipher::from_key(KEY).unwrap();
        let secret = SecretString::from("s3cr3t password");

        let encrypted = cipher.encrypt(&secret);
        assert!(!encrypted.contains("s3cr3t"));

        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted.expose_secret(), "s3cr3t password");
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let cipher = Cipher::from_key(KEY).unwrap();
        let secret = SecretString::from("same");
        assert_ne!(cipher.encrypt(&secret), cipher.encrypt(&secret));
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let cipher = Cipher::from_key(KEY).unwrap();
        let other = Cipher::from_key("fedcba9876543210fedcba9876543210").unwrap();

        for secret in ["", "a", "hunter2", "a much longer passphrase"] {
            let encrypted = cipher.encrypt(&SecretString::from(secret));
            assert!(matches!(other.decrypt(&encrypted), Err(ConfigError::Decrypt)));
        }
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let cipher = Cipher::from_key(KEY).unwrap();
        let mut raw = STANDARD
            .decode(cipher.encrypt(&SecretString::from("hunter2")))
            .unwrap();
        raw[NONCE_LEN] ^= 0x01;

        assert!(matches!(
            cipher.decrypt(&STANDARD.encode(&raw)),
            Err(ConfigError::Decrypt)
        ));
    }

    #[test]
    fn test_random_ciphers_do_not_share_keys() {
        let encrypted = Cipher::random().encrypt(&SecretString::from("pw"));
        assert!(Cipher::random().decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_key_length_is_checked() {
        assert!(matches!(
            Cipher::from_key("short"),
            Err(ConfigError::InvalidKey(5))
        ));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let cipher = Cipher::from_key(KEY).unwrap();
        assert!(cipher.decrypt("not base64 !!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }
}
