//! Fixture stores for tests. Writes the way the bridge would.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

use crate::schema::SCHEMA;
use crate::store::DEFAULT_STORE_FILE;

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub chat_jid: &'a str,
    pub sender: &'a str,
    pub content: &'a str,
    pub timestamp: &'a str,
    pub is_from_me: bool,
    pub media_type: Option<&'a str>,
}

impl<'a> NewMessage<'a> {
    pub fn new(
        id: &'a str,
        chat_jid: &'a str,
        sender: &'a str,
        content: &'a str,
        timestamp: &'a str,
    ) -> Self {
        Self {
            id,
            chat_jid,
            sender,
            content,
            timestamp,
            is_from_me: false,
            media_type: None,
        }
    }

    pub fn from_me(mut self) -> Self {
        self.is_from_me = true;
        self
    }

    pub fn media(mut self, media_type: &'a str) -> Self {
        self.media_type = Some(media_type);
        self
    }
}

pub struct StoreWriter {
    conn: SqliteConnection,
}

impl StoreWriter {
    /// Create (or reopen) a writable store with the bridge schema at `path`.
    pub async fn create(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create store dir");
        }

        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .expect("open fixture store");

        sqlx::raw_sql(SCHEMA)
            .execute(&mut conn)
            .await
            .expect("apply schema");

        Self { conn }
    }

    pub async fn chat(&mut self, jid: &str, name: Option<&str>, is_allowed: bool) {
        sqlx::query(
            "INSERT INTO chats (jid, name, is_allowed) VALUES (?, ?, ?)
             ON CONFLICT(jid) DO UPDATE SET name = excluded.name, is_allowed = excluded.is_allowed",
        )
        .bind(jid)
        .bind(name)
        .bind(is_allowed)
        .execute(&mut self.conn)
        .await
        .expect("insert chat");
    }

    /// Insert a message and bump the chat's last activity.
    pub async fn message(&mut self, msg: NewMessage<'_>) {
        sqlx::query(
            "INSERT INTO messages (id, chat_jid, sender, content, timestamp, is_from_me, media_type)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.id)
        .bind(msg.chat_jid)
        .bind(msg.sender)
        .bind(msg.content)
        .bind(msg.timestamp)
        .bind(msg.is_from_me)
        .bind(msg.media_type)
        .execute(&mut self.conn)
        .await
        .expect("insert message");

        sqlx::query(
            "UPDATE chats SET last_message_time = ?
             WHERE jid = ? AND (last_message_time IS NULL
                 OR julianday(last_message_time) < julianday(?))",
        )
        .bind(msg.timestamp)
        .bind(msg.chat_jid)
        .bind(msg.timestamp)
        .execute(&mut self.conn)
        .await
        .expect("update chat activity");
    }

    pub async fn finish(self) {
        self.conn.close().await.expect("close fixture store");
    }
}

/// Empty store at `<dir>/messages.db`.
pub async fn create_store(dir: &Path) -> PathBuf {
    let path = dir.join(DEFAULT_STORE_FILE);
    StoreWriter::create(&path).await.finish().await;
    path
}
