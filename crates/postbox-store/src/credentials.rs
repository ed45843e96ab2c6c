use postbox_crypto::Cipher;
use postbox_types::UserId;

use crate::backend::Txn;
use crate::error::{StoreError, StoreResult};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Map a (username, password) pair to the user it authenticates.
///
/// The stored password goes through the same cipher used to persist it,
/// so the comparison is always on plaintext.
pub fn verify(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    username: &str,
    password: &str,
) -> StoreResult<UserId> {
    let Some(user_id) = tx.user_id_by_username(username)? else {
        return Err(StoreError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    let user = tx
        .user(user_id)?
        .ok_or_else(|| StoreError::corrupt(format!("username '{}' maps to missing user {}", username, user_id)))?;

    if cipher.decrypt(&user.password)? != password {
        return Err(StoreError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    Ok(user_id)
}
