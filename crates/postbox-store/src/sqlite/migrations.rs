use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Store: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                user_id     INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL
            );

            CREATE TABLE messages (
                message_id  INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id   INTEGER NOT NULL REFERENCES users(user_id),
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_sender ON messages(sender_id);

            CREATE TABLE receivers (
                message_id    INTEGER NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
                receiver_id   INTEGER NOT NULL REFERENCES users(user_id),
                message_read  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (message_id, receiver_id)
            );

            CREATE INDEX idx_receivers_receiver ON receivers(receiver_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    Ok(())
}
