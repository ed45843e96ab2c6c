//! Key-value backend: an in-process keyspace laid out like the Redis
//! deployment (hashes, sets and counters under `users:*` / `messages:*`).
//!
//! A transaction stages every write in an overlay and applies it to the
//! keyspace only on commit, while the keyspace lock is still held.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use postbox_types::{MessageId, UserId};

use crate::backend::{Backend, MessageRecord, Txn, UserRecord};
use crate::error::{StoreError, StoreResult};

const USER_COUNTER: &str = "user_counter";
const MESSAGE_COUNTER: &str = "message_counter";
const USER_PREFIX: &str = "users:ids:";

fn user_key(user_id: UserId) -> String {
    format!("{USER_PREFIX}{user_id}")
}

fn username_key(username: &str) -> String {
    format!("users:username:{username}")
}

fn received_key(user_id: UserId) -> String {
    format!("users:{user_id}:received")
}

fn sent_key(user_id: UserId) -> String {
    format!("users:{user_id}:sent")
}

fn message_key(message_id: MessageId) -> String {
    format!("messages:{message_id}")
}

fn recipients_key(message_id: MessageId) -> String {
    format!("messages:{message_id}:recipients")
}

fn read_key(message_id: MessageId) -> String {
    format!("messages:{message_id}:read")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Int(i64),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<i64>),
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Internal(anyhow!("WRONGTYPE operation against key '{}'", key))
}

fn field<'h>(hash: &'h BTreeMap<String, String>, key: &str, name: &str) -> StoreResult<&'h str> {
    hash.get(name)
        .map(String::as_str)
        .ok_or_else(|| StoreError::corrupt(format!("field '{}' missing on '{}'", name, key)))
}

#[derive(Default)]
struct Keyspace {
    entries: HashMap<String, Value>,
}

impl Keyspace {
    fn apply(&mut self, pending: HashMap<String, Option<Value>>) {
        for (key, value) in pending {
            match value {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

pub struct KvBackend {
    keyspace: Mutex<Keyspace>,
    lock_timeout: Duration,
}

impl KvBackend {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            lock_timeout,
        }
    }
}

impl Backend for KvBackend {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn transact<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Txn) -> StoreResult<T>,
    {
        let mut keyspace = self.keyspace.try_lock_for(self.lock_timeout).ok_or_else(|| {
            StoreError::Busy(format!(
                "Keyspace lock not acquired within {}ms",
                self.lock_timeout.as_millis()
            ))
        })?;

        let (out, pending) = {
            let mut txn = KvTxn::new(&keyspace.entries);
            let out = f(&mut txn)?;
            (out, txn.pending)
        };
        keyspace.apply(pending);
        Ok(out)
    }
}

struct KvTxn<'a> {
    base: &'a HashMap<String, Value>,
    /// `None` marks a deletion.
    pending: HashMap<String, Option<Value>>,
}

impl<'a> KvTxn<'a> {
    fn new(base: &'a HashMap<String, Value>) -> Self {
        Self {
            base,
            pending: HashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        match self.pending.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: String, value: Value) {
        self.pending.insert(key, Some(value));
    }

    fn del(&mut self, key: String) {
        self.pending.insert(key, None);
    }

    fn int(&self, key: &str) -> StoreResult<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn incr(&mut self, key: &str) -> StoreResult<i64> {
        let next = self.int(key)?.unwrap_or(0) + 1;
        self.set(key.to_string(), Value::Int(next));
        Ok(next)
    }

    fn hash(&self, key: &str) -> StoreResult<Option<&BTreeMap<String, String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn members(&self, key: &str) -> StoreResult<BTreeSet<i64>> {
        match self.get(key) {
            None => Ok(BTreeSet::new()),
            Some(Value::Set(s)) => Ok(s.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn sadd(&mut self, key: String, member: i64) -> StoreResult<bool> {
        let mut set = self.members(&key)?;
        let added = set.insert(member);
        if added {
            self.set(key, Value::Set(set));
        }
        Ok(added)
    }

    /// Empty sets cease to exist, as in Redis.
    fn srem(&mut self, key: String, member: i64) -> StoreResult<()> {
        let mut set = self.members(&key)?;
        if set.remove(&member) {
            if set.is_empty() {
                self.del(key);
            } else {
                self.set(key, Value::Set(set));
            }
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let staged = self
            .pending
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k);
        let committed = self.base.keys().filter(|k| !self.pending.contains_key(*k));

        staged
            .chain(committed)
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Txn for KvTxn<'_> {
    fn user(&mut self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        let key = user_key(user_id);
        let Some(hash) = self.hash(&key)? else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            user_id,
            username: field(hash, &key, "username")?.to_string(),
            password: field(hash, &key, "password")?.to_string(),
        }))
    }

    fn user_id_by_username(&mut self, username: &str) -> StoreResult<Option<UserId>> {
        self.int(&username_key(username))
    }

    fn user_exists(&mut self, user_id: UserId) -> StoreResult<bool> {
        Ok(self.get(&user_key(user_id)).is_some())
    }

    fn users(&mut self) -> StoreResult<Vec<UserRecord>> {
        let mut ids = self
            .keys_with_prefix(USER_PREFIX)
            .iter()
            .map(|key| {
                key[USER_PREFIX.len()..]
                    .parse::<UserId>()
                    .map_err(|_| StoreError::corrupt(format!("user key '{}'", key)))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        ids.sort_unstable();

        let mut users = Vec::with_capacity(ids.len());
        for user_id in ids {
            if let Some(user) = self.user(user_id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn insert_user(&mut self, username: &str, password: &str) -> StoreResult<UserId> {
        let user_id = self.incr(USER_COUNTER)?;
        self.set(username_key(username), Value::Int(user_id));
        self.set(
            user_key(user_id),
            Value::Hash(BTreeMap::from([
                ("username".to_string(), username.to_string()),
                ("password".to_string(), password.to_string()),
            ])),
        );
        Ok(user_id)
    }

    fn replace_user(&mut self, previous: &UserRecord, next: &UserRecord) -> StoreResult<()> {
        self.del(username_key(&previous.username));
        self.set(
            user_key(previous.user_id),
            Value::Hash(BTreeMap::from([
                ("username".to_string(), next.username.clone()),
                ("password".to_string(), next.password.clone()),
            ])),
        );
        self.set(username_key(&next.username), Value::Int(previous.user_id));
        Ok(())
    }

    fn message(&mut self, message_id: MessageId) -> StoreResult<Option<MessageRecord>> {
        let key = message_key(message_id);
        let Some(hash) = self.hash(&key)? else {
            return Ok(None);
        };

        let sender_id = field(hash, &key, "sender_id")?
            .parse::<UserId>()
            .map_err(|e| StoreError::corrupt(format!("sender_id on '{}': {}", key, e)))?;
        let body = field(hash, &key, "body")?.to_string();
        let raw_ts = field(hash, &key, "created_at")?;
        let created_at = DateTime::parse_from_rfc3339(raw_ts)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StoreError::corrupt(format!("created_at on '{}': {}", key, e)))?;

        Ok(Some(MessageRecord {
            message_id,
            sender_id,
            body,
            created_at,
            recipients: self.members(&recipients_key(message_id))?,
            read_by: self.members(&read_key(message_id))?,
        }))
    }

    fn insert_message(
        &mut self,
        sender_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
        recipients: &BTreeSet<UserId>,
    ) -> StoreResult<MessageId> {
        let message_id = self.incr(MESSAGE_COUNTER)?;
        self.set(
            message_key(message_id),
            Value::Hash(BTreeMap::from([
                ("sender_id".to_string(), sender_id.to_string()),
                ("body".to_string(), body.to_string()),
                ("created_at".to_string(), created_at.to_rfc3339()),
            ])),
        );

        for recipient_id in recipients {
            self.sadd(received_key(*recipient_id), message_id)?;
        }
        self.set(recipients_key(message_id), Value::Set(recipients.clone()));
        self.sadd(sent_key(sender_id), message_id)?;

        Ok(message_id)
    }

    fn mark_read(&mut self, message_id: MessageId, reader: UserId) -> StoreResult<bool> {
        self.sadd(read_key(message_id), reader)
    }

    fn received(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>> {
        self.members(&received_key(user_id))
    }

    fn sent(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>> {
        self.members(&sent_key(user_id))
    }

    fn remove_message(&mut self, message: &MessageRecord) -> StoreResult<()> {
        let message_id = message.message_id;
        for recipient_id in &message.recipients {
            self.srem(received_key(*recipient_id), message_id)?;
        }
        self.srem(sent_key(message.sender_id), message_id)?;

        self.del(message_key(message_id));
        self.del(recipients_key(message_id));
        self.del(read_key(message_id));
        Ok(())
    }
}
