pub mod backend;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod kv;
pub mod ledger;
pub mod sqlite;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use postbox_crypto::Cipher;
use postbox_types::{MessageId, MessageInfo, UserId, UserInfo};
use tracing::{debug, error, info, warn};

pub use backend::{Backend, Engine, MessageRecord, Txn, UserRecord};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use kv::KvBackend;
pub use sqlite::SqliteBackend;

/// Attempts per operation when the backend reports `Busy`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Store facade: every call is one atomic unit on the backend.
///
/// Callers pass an identity already produced by [`Store::authenticate`].
/// Lock-acquisition timeouts are retried here, nothing else is.
pub struct Store<B: Backend = Engine> {
    backend: B,
    cipher: Arc<dyn Cipher>,
    max_attempts: u32,
}

impl<B: Backend> Store<B> {
    pub fn new(backend: B, cipher: Arc<dyn Cipher>) -> Self {
        info!(
            "Store ready (backend: {}, cipher: {})",
            backend.name(),
            cipher.name()
        );
        Self {
            backend,
            cipher,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn atomic<T, F>(&self, op: &'static str, mut f: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Txn, &dyn Cipher) -> StoreResult<T>,
    {
        let cipher = &*self.cipher;
        let mut attempt = 1;
        loop {
            match self.backend.transact(|tx| f(tx, cipher)) {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!("{}: attempt {} failed, retrying: {}", op, attempt, e);
                    thread::sleep(RETRY_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    if matches!(e.kind(), ErrorKind::Internal | ErrorKind::Busy) {
                        error!("{} failed after {} attempt(s): {}", op, attempt, e);
                    }
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }

    // -- Credentials --

    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<UserId> {
        let result = self.atomic("authenticate", |tx, cipher| {
            credentials::verify(tx, cipher, username, password)
        });
        if let Err(StoreError::Unauthorized(_)) = &result {
            warn!("Rejected credentials for '{}'", username);
        }
        result
    }

    // -- Users --

    pub fn add_user(&self, username: &str, password: &str) -> StoreResult<UserId> {
        let user_id = self.atomic("add_user", |tx, cipher| {
            directory::add_user(tx, cipher, username, password)
        })?;
        info!("User {} registered as '{}'", user_id, username);
        Ok(user_id)
    }

    /// Only the owner may rename themself or change their password.
    pub fn update_user(
        &self,
        caller: UserId,
        user_id: UserId,
        new_username: &str,
        new_password: &str,
    ) -> StoreResult<UserId> {
        let user_id = self.atomic("update_user", |tx, cipher| {
            if !tx.user_exists(user_id)? {
                return Err(StoreError::NotFound(format!("User {} not found", user_id)));
            }
            if caller != user_id {
                return Err(StoreError::Unauthorized(
                    "Users can only update their own account".into(),
                ));
            }
            directory::update_user(tx, cipher, user_id, new_username, new_password)
        })?;
        info!("User {} updated, now '{}'", user_id, new_username);
        Ok(user_id)
    }

    pub fn get_user(&self, user_id: UserId) -> StoreResult<UserInfo> {
        debug!("get_user {}", user_id);
        self.atomic("get_user", |tx, _| directory::get_user(tx, user_id))
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<UserInfo> {
        debug!("get_user_by_username '{}'", username);
        self.atomic("get_user_by_username", |tx, _| {
            directory::get_user_by_username(tx, username)
        })
    }

    pub fn list_users(&self) -> StoreResult<Vec<UserInfo>> {
        self.atomic("list_users", |tx, _| directory::list_users(tx))
    }

    /// Register fixed users, skipping names that are already taken.
    /// Returns how many were created.
    pub fn seed_users(&self, users: &[(&str, &str)]) -> StoreResult<usize> {
        let mut created = 0;
        for (username, password) in users {
            match self.add_user(username, password) {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => debug!("Seed user '{}' already present", username),
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    // -- Messages --

    pub fn send(&self, caller: UserId, recipients: &[UserId], body: &str) -> StoreResult<MessageId> {
        let message_id = self.atomic("send", |tx, cipher| {
            ledger::send(tx, cipher, caller, recipients, body)
        })?;
        info!("Message {} sent by {} to {:?}", message_id, caller, recipients);
        Ok(message_id)
    }

    pub fn broadcast(&self, caller: UserId, body: &str) -> StoreResult<MessageId> {
        let message_id = self.atomic("broadcast", |tx, cipher| {
            ledger::broadcast(tx, cipher, caller, body)
        })?;
        info!("Message {} broadcast by {}", message_id, caller);
        Ok(message_id)
    }

    pub fn get_message(&self, caller: UserId, message_id: MessageId) -> StoreResult<MessageInfo> {
        debug!("get_message {} by {}", message_id, caller);
        self.atomic("get_message", |tx, cipher| {
            ledger::get_message(tx, cipher, caller, message_id)
        })
    }

    pub fn get_received(&self, user_id: UserId) -> StoreResult<Vec<MessageId>> {
        self.atomic("get_received", |tx, _| ledger::get_received(tx, user_id))
    }

    pub fn get_sent(&self, user_id: UserId) -> StoreResult<Vec<MessageId>> {
        self.atomic("get_sent", |tx, _| ledger::get_sent(tx, user_id))
    }

    pub fn delete_message(&self, caller: UserId, message_id: MessageId) -> StoreResult<()> {
        self.atomic("delete_message", |tx, _| ledger::delete(tx, caller, message_id))?;
        info!("Message {} deleted by {}", message_id, caller);
        Ok(())
    }
}
