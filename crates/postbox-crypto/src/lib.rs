/// Postbox at-rest encryption hook.
///
/// The store never knows which cipher is active: it calls [`Cipher::encrypt`]
/// before persisting a password or message body and [`Cipher::decrypt`] after
/// loading one. [`Passthrough`] is used when encryption is disabled.
pub mod cipher;
pub mod encrypt;
pub mod keys;

pub use cipher::{Cipher, Passthrough};
pub use encrypt::AesGcmCipher;
