use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

/// Generate a random 256-bit at-rest encryption key.
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encode a key to base64 for `POSTBOX_ENCRYPTION_KEY`.
pub fn key_to_base64(key: &[u8; 32]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key.
pub fn key_from_base64(encoded: &str) -> Result<[u8; 32]> {
    let bytes = BASE64.decode(encoded.trim())?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("Invalid key length, expected 32 bytes"))?;
    Ok(key)
}
