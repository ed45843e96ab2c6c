use anyhow::Result;

/// Reversible transformation applied to secrets and bodies around persistence.
///
/// Implementations must be deterministic in the sense that
/// `decrypt(encrypt(x)) == x`; the ciphertext itself may differ between calls.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, stored: &str) -> Result<String>;

    /// Short name used in startup logs.
    fn name(&self) -> &'static str;
}

/// Identity cipher for deployments without at-rest encryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Cipher for Passthrough {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, stored: &str) -> Result<String> {
        Ok(stored.to_string())
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
