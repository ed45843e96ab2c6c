//! Message Ledger: creation with a fixed recipient set, read tracking,
//! sent/received enumeration and retraction under the read-gate.
//!
//! Every function runs inside one atomic unit supplied by the facade, so
//! a `get_message` marking a read and a `delete` checking `read_by` can
//! never interleave on the same message.

use std::collections::BTreeSet;

use chrono::Utc;
use postbox_crypto::Cipher;
use postbox_types::{MessageId, MessageInfo, UserId};

use crate::backend::{MessageRecord, Txn};
use crate::error::{StoreError, StoreResult};

/// Bodies must be strictly shorter than this many characters.
pub const MAX_BODY_LEN: usize = 4096;

pub fn validate_body(body: &str) -> StoreResult<()> {
    if body.chars().count() >= MAX_BODY_LEN {
        return Err(StoreError::BadRequest(format!(
            "Message body must be shorter than {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(())
}

pub fn send(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    sender_id: UserId,
    recipient_ids: &[UserId],
    body: &str,
) -> StoreResult<MessageId> {
    require_sender(tx, sender_id)?;

    let recipients: BTreeSet<UserId> = recipient_ids.iter().copied().collect();
    if recipients.is_empty() {
        return Err(StoreError::BadRequest("At least one recipient is required".into()));
    }
    for &recipient_id in &recipients {
        if !tx.user_exists(recipient_id)? {
            return Err(StoreError::NotFound(format!(
                "Recipient {} is not associated to an existing user",
                recipient_id
            )));
        }
    }

    validate_body(body)?;
    create(tx, cipher, sender_id, &recipients, body)
}

/// Like [`send`], addressed to every user registered at call time except
/// the sender.
pub fn broadcast(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    sender_id: UserId,
    body: &str,
) -> StoreResult<MessageId> {
    require_sender(tx, sender_id)?;

    let recipients: BTreeSet<UserId> = tx
        .users()?
        .into_iter()
        .map(|u| u.user_id)
        .filter(|&id| id != sender_id)
        .collect();
    if recipients.is_empty() {
        return Err(StoreError::BadRequest(
            "No other registered users to broadcast to".into(),
        ));
    }

    validate_body(body)?;
    create(tx, cipher, sender_id, &recipients, body)
}

/// Fetch a message as `caller`. A recipient's first fetch adds them to
/// `read_by`; the returned value already includes that insertion.
pub fn get_message(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    caller: UserId,
    message_id: MessageId,
) -> StoreResult<MessageInfo> {
    let mut record = load(tx, message_id)?;

    let is_recipient = record.recipients.contains(&caller);
    if !is_recipient && record.sender_id != caller {
        return Err(StoreError::Unauthorized(
            "You have to be either a recipient or the sender of the message to retrieve it".into(),
        ));
    }

    if is_recipient && !record.read_by.contains(&caller) {
        tx.mark_read(message_id, caller)?;
        record.read_by.insert(caller);
    }

    Ok(MessageInfo {
        message_id,
        sender_id: record.sender_id,
        body: cipher.decrypt(&record.body)?,
        created_at: record.created_at,
        recipients: record.recipients.into_iter().collect(),
        read_by: record.read_by.into_iter().collect(),
    })
}

pub fn get_received(tx: &mut dyn Txn, user_id: UserId) -> StoreResult<Vec<MessageId>> {
    require_user(tx, user_id)?;
    Ok(tx.received(user_id)?.into_iter().collect())
}

pub fn get_sent(tx: &mut dyn Txn, user_id: UserId) -> StoreResult<Vec<MessageId>> {
    require_user(tx, user_id)?;
    Ok(tx.sent(user_id)?.into_iter().collect())
}

/// Retract a message. Only the sender may do so, and only while no
/// recipient has read it.
pub fn delete(tx: &mut dyn Txn, caller: UserId, message_id: MessageId) -> StoreResult<()> {
    let record = load(tx, message_id)?;

    if record.sender_id != caller {
        return Err(StoreError::Unauthorized(
            "Only the sender of a message can delete it".into(),
        ));
    }
    if !record.read_by.is_empty() {
        return Err(StoreError::Conflict(
            "The message has already been read by at least one recipient, deletion is not possible"
                .into(),
        ));
    }

    tx.remove_message(&record)
}

fn create(
    tx: &mut dyn Txn,
    cipher: &dyn Cipher,
    sender_id: UserId,
    recipients: &BTreeSet<UserId>,
    body: &str,
) -> StoreResult<MessageId> {
    let stored = cipher.encrypt(body)?;
    tx.insert_message(sender_id, &stored, Utc::now(), recipients)
}

fn load(tx: &mut dyn Txn, message_id: MessageId) -> StoreResult<MessageRecord> {
    tx.message(message_id)?
        .ok_or_else(|| StoreError::NotFound(format!("Message {} not found", message_id)))
}

fn require_sender(tx: &mut dyn Txn, sender_id: UserId) -> StoreResult<()> {
    if !tx.user_exists(sender_id)? {
        return Err(StoreError::NotFound(format!(
            "Sender {} is not associated to an existing user",
            sender_id
        )));
    }
    Ok(())
}

fn require_user(tx: &mut dyn Txn, user_id: UserId) -> StoreResult<()> {
    if !tx.user_exists(user_id)? {
        return Err(StoreError::NotFound(format!("User {} not found", user_id)));
    }
    Ok(())
}
