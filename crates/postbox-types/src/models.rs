use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type MessageId = i64;

/// Public view of a user. The password never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: UserId,
    pub username: String,
}

/// A message as returned to its sender or one of its recipients.
/// `body` is always plaintext here; at-rest encryption is a store concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub recipients: Vec<UserId>,
    pub read_by: Vec<UserId>,
}

impl MessageInfo {
    pub fn is_read(&self) -> bool {
        !self.read_by.is_empty()
    }
}
