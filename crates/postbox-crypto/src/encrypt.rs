use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::cipher::Cipher;

const NONCE_LEN: usize = 12;

/// Encrypt bytes with AES-256-GCM under a fresh random nonce.
/// Returns `nonce || ciphertext`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Inverse of [`seal`].
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(anyhow!("Sealed value too short: {} bytes", sealed.len()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(plaintext)
}

/// AES-256-GCM cipher storing values as base64(nonce || ciphertext).
pub struct AesGcmCipher {
    key: [u8; 32],
}

impl AesGcmCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(BASE64.encode(seal(&self.key, plaintext.as_bytes())?))
    }

    fn decrypt(&self, stored: &str) -> Result<String> {
        let sealed = BASE64.decode(stored)?;
        let plaintext = open(&self.key, &sealed)?;
        Ok(String::from_utf8(plaintext)?)
    }

    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }
}
