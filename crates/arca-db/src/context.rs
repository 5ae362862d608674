use arca_core::{Message, MessageContext};

use crate::error::{DbError, Result};
use crate::rows::{MESSAGE_COLUMNS, MessageRow, into_messages};
use crate::store::ArchiveDb;

impl ArchiveDb {
    /// The message `message_id` with up to `before` earlier and `after` later
    /// messages from the same chat, all in chronological order.
    ///
    /// Chat access is not re-checked here: callers reach this with ids that
    /// came out of an access-filtered listing.
    pub async fn message_context(
        &mut self,
        message_id: &str,
        before: u32,
        after: u32,
    ) -> Result<MessageContext> {
        self.expand(message_id, None, before, after).await
    }

    /// [`Self::message_context`] pinned to one chat, since ids are only
    /// guaranteed unique per chat by the store's key.
    pub async fn message_context_in_chat(
        &mut self,
        message_id: &str,
        chat_jid: &str,
        before: u32,
        after: u32,
    ) -> Result<MessageContext> {
        self.expand(message_id, Some(chat_jid), before, after).await
    }

    pub(crate) async fn expand(
        &mut self,
        message_id: &str,
        chat_jid: Option<&str>,
        before: u32,
        after: u32,
    ) -> Result<MessageContext> {
        let target_sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages JOIN chats ON messages.chat_jid = chats.jid
             WHERE messages.id = ? AND (? IS NULL OR messages.chat_jid = ?)
             ORDER BY messages.rowid ASC LIMIT 1"
        );
        let target = sqlx::query_as::<_, MessageRow>(&target_sql)
            .bind(message_id)
            .bind(chat_jid)
            .bind(chat_jid)
            .fetch_optional(&mut self.conn)
            .await?
            .ok_or_else(|| DbError::MessageNotFound(message_id.to_string()))?;

        let chat = target.chat_jid.clone();
        let at = target.timestamp.clone();

        let before_sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages JOIN chats ON messages.chat_jid = chats.jid
             WHERE messages.chat_jid = ? AND julianday(messages.timestamp) < julianday(?)
             ORDER BY julianday(messages.timestamp) DESC, messages.rowid DESC
             LIMIT ?"
        );
        let mut earlier = into_messages(
            sqlx::query_as::<_, MessageRow>(&before_sql)
                .bind(&chat)
                .bind(&at)
                .bind(i64::from(before))
                .fetch_all(&mut self.conn)
                .await?,
        );
        earlier.reverse();

        let after_sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages JOIN chats ON messages.chat_jid = chats.jid
             WHERE messages.chat_jid = ? AND julianday(messages.timestamp) > julianday(?)
             ORDER BY julianday(messages.timestamp) ASC, messages.rowid ASC
             LIMIT ?"
        );
        let later = into_messages(
            sqlx::query_as::<_, MessageRow>(&after_sql)
                .bind(&chat)
                .bind(&at)
                .bind(i64::from(after))
                .fetch_all(&mut self.conn)
                .await?,
        );

        tracing::debug!(
            message_id,
            chat = %chat,
            before = earlier.len(),
            after = later.len(),
            "Expanded message context"
        );

        Ok(MessageContext {
            message: Message::try_from(target)?,
            before: earlier,
            after: later,
        })
    }
}
