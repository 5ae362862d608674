use arca_core::{Chat, Contact, LastMessage, Message, parse_stored_timestamp};
use chrono::{DateTime, Utc};

use crate::error::{DbError, Result};

/// Columns selected for every message row. Expects `messages JOIN chats`.
pub(crate) const MESSAGE_COLUMNS: &str = "messages.timestamp AS timestamp, \
     messages.sender AS sender, \
     chats.name AS chat_name, \
     messages.content AS content, \
     messages.is_from_me AS is_from_me, \
     messages.chat_jid AS chat_jid, \
     messages.id AS id, \
     messages.media_type AS media_type";

/// Chat row plus the snapshot of the newest message and its sender's name.
pub(crate) const CHAT_SELECT_WITH_LAST: &str = "SELECT chats.jid AS jid, \
     chats.name AS name, \
     chats.last_message_time AS last_message_time, \
     chats.is_allowed AS is_allowed, \
     chats.unread_count AS unread_count, \
     last.id AS last_message_id, \
     last.content AS last_message, \
     last.sender AS last_sender, \
     sender_chat.name AS last_sender_name, \
     last.is_from_me AS last_is_from_me, \
     last.media_type AS last_media_type, \
     last.timestamp AS last_message_timestamp \
     FROM chats \
     LEFT JOIN messages last ON last.rowid = ( \
         SELECT m.rowid FROM messages m WHERE m.chat_jid = chats.jid \
         ORDER BY julianday(m.timestamp) DESC, m.rowid DESC LIMIT 1) \
     LEFT JOIN chats sender_chat ON sender_chat.jid = last.sender";

pub(crate) const CHAT_SELECT: &str = "SELECT chats.jid AS jid, \
     chats.name AS name, \
     chats.last_message_time AS last_message_time, \
     chats.is_allowed AS is_allowed, \
     chats.unread_count AS unread_count, \
     NULL AS last_message_id, \
     NULL AS last_message, \
     NULL AS last_sender, \
     NULL AS last_sender_name, \
     NULL AS last_is_from_me, \
     NULL AS last_media_type, \
     NULL AS last_message_timestamp \
     FROM chats";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub timestamp: String,
    pub sender: Option<String>,
    pub chat_name: Option<String>,
    pub content: Option<String>,
    pub is_from_me: Option<bool>,
    pub chat_jid: String,
    pub id: String,
    pub media_type: Option<String>,
}

impl TryFrom<MessageRow> for Message {
    type Error = DbError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            timestamp: timestamp(&row.timestamp)?,
            sender: row.sender.unwrap_or_default(),
            content: row.content.unwrap_or_default(),
            is_from_me: row.is_from_me.unwrap_or(false),
            chat_jid: row.chat_jid,
            id: row.id,
            chat_name: row.chat_name,
            media_type: row.media_type.filter(|m| !m.is_empty()),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChatRow {
    pub jid: String,
    pub name: Option<String>,
    pub last_message_time: Option<String>,
    pub is_allowed: Option<bool>,
    pub unread_count: Option<i64>,
    pub last_message_id: Option<String>,
    pub last_message: Option<String>,
    pub last_sender: Option<String>,
    pub last_sender_name: Option<String>,
    pub last_is_from_me: Option<bool>,
    pub last_media_type: Option<String>,
    pub last_message_timestamp: Option<String>,
}

impl TryFrom<ChatRow> for Chat {
    type Error = DbError;

    fn try_from(row: ChatRow) -> Result<Self> {
        let last_message = match row.last_message_id {
            Some(id) => Some(LastMessage {
                id,
                content: row.last_message,
                sender: row.last_sender,
                sender_name: row.last_sender_name,
                is_from_me: row.last_is_from_me,
                media_type: row.last_media_type.filter(|m| !m.is_empty()),
                timestamp: optional_timestamp(row.last_message_timestamp)?,
            }),
            None => None,
        };

        Ok(Chat {
            jid: row.jid,
            name: row.name,
            last_message_time: optional_timestamp(row.last_message_time)?,
            is_allowed: row.is_allowed.unwrap_or(false),
            unread_count: row.unread_count,
            last_message,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ContactRow {
    pub jid: String,
    pub name: Option<String>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact::from_chat(row.jid, row.name)
    }
}

fn timestamp(value: &str) -> Result<DateTime<Utc>> {
    parse_stored_timestamp(value).ok_or_else(|| DbError::Timestamp {
        value: value.to_string(),
    })
}

fn optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => timestamp(v).map(Some),
    }
}

/// Rows the bridge wrote with an unreadable timestamp are skipped with a
/// warning so one bad row does not hide the rest of a listing.
pub(crate) fn readable<R, T>(row: R) -> Option<T>
where
    T: TryFrom<R, Error = DbError>,
{
    match T::try_from(row) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable row");
            None
        }
    }
}

pub(crate) fn into_messages(rows: Vec<MessageRow>) -> Vec<Message> {
    rows.into_iter().filter_map(readable).collect()
}

pub(crate) fn into_chats(rows: Vec<ChatRow>) -> Vec<Chat> {
    rows.into_iter().filter_map(readable).collect()
}
