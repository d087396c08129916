use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use synai_types::RelayError;

/// Salt used for master-key derivation. Fixed so that the same secret derives
/// the same key across restarts.
pub const KDF_SALT: &[u8] = b"synai_salt_v1";
pub const KDF_ITERATIONS: u32 = 100_000;
/// Fallback secret when `SYNAI_MASTER_KEY` is unset. Demo use only.
pub const DEFAULT_MASTER_SECRET: &str = "default_synai_secret_key_change_me";

const NONCE_LEN: usize = 12;

/// Derive a 256-bit key from an operator secret with PBKDF2-HMAC-SHA256.
pub fn derive_key(secret: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut key);
    key
}

/// AES-256-GCM cipher for private keys at rest.
///
/// Ciphertexts are `base64(nonce || ciphertext || tag)` with a fresh random nonce
/// per encryption.
#[derive(Clone)]
pub struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    pub fn from_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn from_secret(secret: &str) -> Self {
        Self::from_key(&derive_key(secret))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, RelayError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| RelayError::Wallet(format!("encryption failed: {e}")))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, RelayError> {
        let sealed = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| RelayError::Wallet(format!("invalid ciphertext encoding: {e}")))?;
        if sealed.len() < NONCE_LEN {
            return Err(RelayError::Wallet("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| RelayError::Wallet(format!("decryption failed: {e}")))
    }
}

impl std::fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCipher").finish_non_exhaustive()
    }
}
