use ed25519_dalek::SigningKey;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use synai_types::{RelayError, Wallet};

use crate::cipher::KeyCipher;

/// Issues managed wallets for newly seen agents.
pub trait WalletIssuer: Send + Sync {
    /// Generate a fresh keypair and return its address with the encrypted private key.
    fn create_wallet(&self) -> Result<Wallet, RelayError>;

    /// Recover the hex-encoded private key from its ciphertext.
    fn decrypt_privkey(&self, encrypted_privkey: &str) -> Result<String, RelayError>;
}

/// Ed25519 wallets whose private keys are sealed with one process-wide cipher.
///
/// Every agent key is encrypted under the same derived key; rotating the master
/// secret makes all previously issued ciphertexts unreadable.
#[derive(Debug, Clone)]
pub struct WalletManager {
    cipher: KeyCipher,
}

impl WalletManager {
    pub fn new(cipher: KeyCipher) -> Self {
        Self { cipher }
    }

    /// Derive the cipher from an operator secret (PBKDF2, fixed salt).
    pub fn from_master_secret(secret: &str) -> Self {
        if secret == crate::cipher::DEFAULT_MASTER_SECRET {
            tracing::warn!("Using the default wallet master secret; set SYNAI_MASTER_KEY");
        }
        Self::new(KeyCipher::from_secret(secret))
    }

    /// Use a raw 256-bit key. Intended for tests that need a deterministic cipher.
    pub fn from_key(key: [u8; 32]) -> Self {
        Self::new(KeyCipher::from_key(&key))
    }
}

/// `0x` followed by the last 20 bytes of SHA-256 over the public key.
pub fn address_for(signing_key: &SigningKey) -> String {
    let digest = Sha256::digest(signing_key.verifying_key().as_bytes());
    format!("0x{}", hex::encode(&digest[12..]))
}

impl WalletIssuer for WalletManager {
    fn create_wallet(&self) -> Result<Wallet, RelayError> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);

        let address = address_for(&signing_key);
        let privkey_hex = hex::encode(signing_key.to_bytes());
        let encrypted_privkey = self.cipher.encrypt(privkey_hex.as_bytes())?;

        Ok(Wallet {
            address,
            encrypted_privkey,
        })
    }

    fn decrypt_privkey(&self, encrypted_privkey: &str) -> Result<String, RelayError> {
        let bytes = self.cipher.decrypt(encrypted_privkey)?;
        String::from_utf8(bytes)
            .map_err(|e| RelayError::Wallet(format!("decrypted key is not utf-8: {e}")))
    }
}
