#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use postbox_crypto::Passthrough;
use postbox_store::{Engine, KvBackend, SqliteBackend, Store, StoreError};

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// One fresh store per backend, so every scenario runs against both.
pub fn stores() -> Vec<(&'static str, Store)> {
    vec![
        (
            "sqlite",
            Store::new(
                Engine::from(SqliteBackend::open_in_memory(LOCK_TIMEOUT).unwrap()),
                Arc::new(Passthrough),
            ),
        ),
        (
            "key-value",
            Store::new(Engine::from(KvBackend::new(LOCK_TIMEOUT)), Arc::new(Passthrough)),
        ),
    ]
}

pub fn is_bad_request<T: std::fmt::Debug>(r: &Result<T, StoreError>) -> bool {
    matches!(r, Err(StoreError::BadRequest(_)))
}

pub fn is_unauthorized<T: std::fmt::Debug>(r: &Result<T, StoreError>) -> bool {
    matches!(r, Err(StoreError::Unauthorized(_)))
}

pub fn is_not_found<T: std::fmt::Debug>(r: &Result<T, StoreError>) -> bool {
    matches!(r, Err(StoreError::NotFound(_)))
}

pub fn is_conflict<T: std::fmt::Debug>(r: &Result<T, StoreError>) -> bool {
    matches!(r, Err(StoreError::Conflict(_)))
}
