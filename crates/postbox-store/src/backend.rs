//! Storage capability the Directory and Ledger are written against.
//!
//! A [`Backend`] provides atomic units; a [`Txn`] is the view of storage
//! inside one of them. Neither knows any business rule: validation,
//! authorization and the read-gate live in `directory` and `ledger`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use postbox_types::{MessageId, UserId};

use crate::error::StoreResult;
use crate::kv::KvBackend;
use crate::sqlite::SqliteBackend;

/// A user as persisted. `password` is in stored (possibly encrypted) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub password: String,
}

/// A message as persisted. `body` is in stored (possibly encrypted) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub recipients: BTreeSet<UserId>,
    pub read_by: BTreeSet<UserId>,
}

/// Rule-free storage primitives available inside an atomic unit.
pub trait Txn {
    fn user(&mut self, user_id: UserId) -> StoreResult<Option<UserRecord>>;

    fn user_id_by_username(&mut self, username: &str) -> StoreResult<Option<UserId>>;

    fn user_exists(&mut self, user_id: UserId) -> StoreResult<bool> {
        Ok(self.user(user_id)?.is_some())
    }

    /// All users, ordered by id.
    fn users(&mut self) -> StoreResult<Vec<UserRecord>>;

    /// Allocates a fresh id and stores the user with its username mapping.
    fn insert_user(&mut self, username: &str, password: &str) -> StoreResult<UserId>;

    /// Overwrites `previous` with `next` (same id), moving the username
    /// mapping from the old name to the new one.
    fn replace_user(&mut self, previous: &UserRecord, next: &UserRecord) -> StoreResult<()>;

    fn message(&mut self, message_id: MessageId) -> StoreResult<Option<MessageRecord>>;

    /// Allocates a fresh id and stores the message together with its
    /// recipient set and the sent/received index entries.
    fn insert_message(
        &mut self,
        sender_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
        recipients: &BTreeSet<UserId>,
    ) -> StoreResult<MessageId>;

    /// Adds `reader` to the message's read set. Returns false if already present.
    fn mark_read(&mut self, message_id: MessageId, reader: UserId) -> StoreResult<bool>;

    fn received(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>>;

    fn sent(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>>;

    /// Removes the message and every index entry pointing at it.
    fn remove_message(&mut self, message: &MessageRecord) -> StoreResult<()>;
}

/// A persistence engine able to run atomic units.
///
/// `transact` commits every write made through the [`Txn`] if `f` returns
/// `Ok`, and discards all of them otherwise. Entering the unit is bounded
/// by the backend's lock timeout, which surfaces as `StoreError::Busy`.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn transact<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Txn) -> StoreResult<T>;
}

/// Runtime-selected backend.
pub enum Engine {
    Sqlite(SqliteBackend),
    KeyValue(KvBackend),
}

impl Backend for Engine {
    fn name(&self) -> &'static str {
        match self {
            Engine::Sqlite(b) => b.name(),
            Engine::KeyValue(b) => b.name(),
        }
    }

    fn transact<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Txn) -> StoreResult<T>,
    {
        match self {
            Engine::Sqlite(b) => b.transact(f),
            Engine::KeyValue(b) => b.transact(f),
        }
    }
}

impl From<SqliteBackend> for Engine {
    fn from(backend: SqliteBackend) -> Self {
        Engine::Sqlite(backend)
    }
}

impl From<KvBackend> for Engine {
    fn from(backend: KvBackend) -> Self {
        Engine::KeyValue(backend)
    }
}
