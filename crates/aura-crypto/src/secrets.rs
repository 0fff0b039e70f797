//! # Secret Sealing
//!
//! Reservation codes are sealed with Fernet (AES-128-CBC + HMAC-SHA256)
//! before they touch the database. A sealed token cannot be read or
//! manipulated without the process key.

use crate::CryptoError;

/// Authenticated encryption for deal secrets.
pub struct SecretBox {
    fernet: fernet::Fernet,
}

impl SecretBox {
    /// Build from a base64-encoded 32-byte key.
    pub fn new(encryption_key: &str) -> Result<Self, CryptoError> {
        let fernet =
            fernet::Fernet::new(encryption_key).ok_or(CryptoError::InvalidEncryptionKey)?;
        Ok(Self { fernet })
    }

    /// Generate a fresh key, suitable for `crypto.secret_encryption_key`.
    pub fn generate_key() -> String {
        fernet::Fernet::generate_key()
    }

    /// Seal a plaintext secret into a token.
    pub fn seal(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Open a token back into the plaintext secret.
    ///
    /// Fails on a wrong key or a tampered token.
    pub fn open(&self, token: &str) -> Result<String, CryptoError> {
        let bytes = self
            .fernet
            .decrypt(token)
            .map_err(|_| CryptoError::OpenFailed)?;
        String::from_utf8(bytes).map_err(|_| CryptoError::OpenFailed)
    }
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key.
        f.write_str("SecretBox(***)")
    }
}
