//! User Directory: registration, renames and lookups. Owns username uniqueness.

use std::sync::LazyLock;

use postbox_crypto::Cipher;
use postbox_types::{UserId, UserInfo};
use regex::Regex;

use crate::backend::{Txn, UserRecord};
use crate::error::{StoreError, StoreResult};

pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 32;

static USERNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_-][A-Za-z0-9_-]*$").expect("username pattern is a valid regex")
});

pub fn validate(username: &str, password: &str) -> StoreResult<()> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(StoreError::BadRequest(format!(
            "Invalid username, length must be between 1 and {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !USERNAME_PATTERN.is_match(username) {
        return Err(StoreError::BadRequest(
            "Invalid username, it must contain only alphanumeric characters or '-' '_' and not start with a number"
                .into(),
        ));
    }
    if password.is_empty() || password.chars().count() > MAX_PASSWORD_LEN {
        return Err(StoreError::BadRequest(format!(
            "Invalid password, length must be between 1 and {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn add_user(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    username: &str,
    password: &str,
) -> StoreResult<UserId> {
    validate(username, password)?;

    if tx.user_id_by_username(username)?.is_some() {
        return Err(StoreError::Conflict(format!("Username '{}' already in use", username)));
    }

    let stored = cipher.encrypt(password)?;
    tx.insert_user(username, &stored)
}

pub fn update_user(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    user_id: UserId,
    new_username: &str,
    new_password: &str,
) -> StoreResult<UserId> {
    validate(new_username, new_password)?;

    let previous = tx
        .user(user_id)?
        .ok_or_else(|| StoreError::NotFound(format!("User {} not found", user_id)))?;

    match tx.user_id_by_username(new_username)? {
        Some(owner) if owner != user_id => {
            return Err(StoreError::Conflict(format!(
                "Username '{}' already in use",
                new_username
            )));
        }
        _ => {}
    }

    let next = UserRecord {
        user_id,
        username: new_username.to_string(),
        password: cipher.encrypt(new_password)?,
    };
    tx.replace_user(&previous, &next)?;
    Ok(user_id)
}

pub fn get_user(tx: &mut dyn Txn, user_id: UserId) -> StoreResult<UserInfo> {
    tx.user(user_id)?
        .map(public)
        .ok_or_else(|| StoreError::NotFound(format!("User {} not found", user_id)))
}

pub fn get_user_by_username(tx: &mut dyn Txn, username: &str) -> StoreResult<UserInfo> {
    let user_id = tx
        .user_id_by_username(username)?
        .ok_or_else(|| StoreError::NotFound(format!("User '{}' not found", username)))?;
    get_user(tx, user_id)
}

pub fn list_users(tx: &mut dyn Txn) -> StoreResult<Vec<UserInfo>> {
    Ok(tx.users()?.into_iter().map(public).collect())
}

fn public(user: UserRecord) -> UserInfo {
    UserInfo {
        user_id: user.user_id,
        username: user.username,
    }
}
