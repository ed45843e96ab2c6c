use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use postbox_types::{MessageId, UserId};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::backend::{MessageRecord, Txn, UserRecord};
use crate::error::{StoreError, StoreResult};

pub(super) struct SqliteTxn<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteTxn<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn id_set(&self, sql: &str, id: i64) -> StoreResult<BTreeSet<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<BTreeSet<i64>, _>>()?;
        Ok(ids)
    }
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
    })
}

fn parse_timestamp(raw: &str, message_id: MessageId) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::corrupt(format!("created_at '{}' on message {}: {}", raw, message_id, e))
        })
}

impl Txn for SqliteTxn<'_> {
    fn user(&mut self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT user_id, username, password FROM users WHERE user_id = ?1")?;
        Ok(stmt.query_row([user_id], user_row).optional()?)
    }

    fn user_id_by_username(&mut self, username: &str) -> StoreResult<Option<UserId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT user_id FROM users WHERE username = ?1")?;
        Ok(stmt.query_row([username], |row| row.get(0)).optional()?)
    }

    fn users(&mut self) -> StoreResult<Vec<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT user_id, username, password FROM users ORDER BY user_id")?;
        let rows = stmt
            .query_map([], user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_user(&mut self, username: &str, password: &str) -> StoreResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            (username, password),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn replace_user(&mut self, previous: &UserRecord, next: &UserRecord) -> StoreResult<()> {
        // The UNIQUE column is the username mapping; one UPDATE moves it.
        let changed = self.conn.execute(
            "UPDATE users SET username = ?1, password = ?2 WHERE user_id = ?3",
            params![next.username, next.password, previous.user_id],
        )?;
        if changed != 1 {
            return Err(StoreError::NotFound(format!("User {} not found", previous.user_id)));
        }
        Ok(())
    }

    fn message(&mut self, message_id: MessageId) -> StoreResult<Option<MessageRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT sender_id, body, created_at FROM messages WHERE message_id = ?1",
        )?;
        let head: Option<(UserId, String, String)> = stmt
            .query_row([message_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .optional()?;

        let Some((sender_id, body, created_at)) = head else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT receiver_id, message_read FROM receivers WHERE message_id = ?1",
        )?;
        let mut recipients = BTreeSet::new();
        let mut read_by = BTreeSet::new();
        let rows = stmt.query_map([message_id], |row| {
            Ok((row.get::<_, UserId>(0)?, row.get::<_, bool>(1)?))
        })?;
        for row in rows {
            let (receiver_id, read) = row?;
            recipients.insert(receiver_id);
            if read {
                read_by.insert(receiver_id);
            }
        }

        Ok(Some(MessageRecord {
            message_id,
            sender_id,
            body,
            created_at: parse_timestamp(&created_at, message_id)?,
            recipients,
            read_by,
        }))
    }

    fn insert_message(
        &mut self,
        sender_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
        recipients: &BTreeSet<UserId>,
    ) -> StoreResult<MessageId> {
        self.conn.execute(
            "INSERT INTO messages (sender_id, body, created_at) VALUES (?1, ?2, ?3)",
            params![sender_id, body, created_at.to_rfc3339()],
        )?;
        let message_id = self.conn.last_insert_rowid();

        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO receivers (message_id, receiver_id) VALUES (?1, ?2)")?;
        for recipient_id in recipients {
            stmt.execute([message_id, *recipient_id])?;
        }

        Ok(message_id)
    }

    fn mark_read(&mut self, message_id: MessageId, reader: UserId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE receivers SET message_read = 1
             WHERE message_id = ?1 AND receiver_id = ?2 AND message_read = 0",
            [message_id, reader],
        )?;
        Ok(changed > 0)
    }

    fn received(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>> {
        self.id_set("SELECT message_id FROM receivers WHERE receiver_id = ?1", user_id)
    }

    fn sent(&mut self, user_id: UserId) -> StoreResult<BTreeSet<MessageId>> {
        self.id_set("SELECT message_id FROM messages WHERE sender_id = ?1", user_id)
    }

    fn remove_message(&mut self, message: &MessageRecord) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM receivers WHERE message_id = ?1",
            [message.message_id],
        )?;
        self.conn.execute(
            "DELETE FROM messages WHERE message_id = ?1",
            [message.message_id],
        )?;
        Ok(())
    }
}
