use arca_core::{Chat, ChatListQuery, ChatScope, Contact, Message, Pagination, jid};

use crate::error::Result;
use crate::query::{
    chat_by_jid_query, chat_list_query, contact_chats_query, contact_query, direct_chat_query,
    last_interaction_query, like_pattern,
};
use crate::rows::{ChatRow, ContactRow, MessageRow, into_chats};
use crate::store::ArchiveDb;

impl ArchiveDb {
    pub async fn list_chats(
        &mut self,
        scope: ChatScope,
        query: &ChatListQuery,
    ) -> Result<Vec<Chat>> {
        let mut qb = chat_list_query(scope, query);
        let rows = qb
            .build_query_as::<ChatRow>()
            .fetch_all(&mut self.conn)
            .await?;

        tracing::debug!(?scope, sort = ?query.sort_by, hits = rows.len(), "Listed chats");
        Ok(into_chats(rows))
    }

    /// Direct chats whose name or JID contains `query`.
    pub async fn search_contacts(&mut self, query: &str, page: Pagination) -> Result<Vec<Contact>> {
        let mut qb = contact_query(query, page);
        let rows = qb
            .build_query_as::<ContactRow>()
            .fetch_all(&mut self.conn)
            .await?;

        Ok(rows.into_iter().map(Contact::from).collect())
    }

    pub async fn get_chat(
        &mut self,
        jid: &str,
        include_last_message: bool,
    ) -> Result<Option<Chat>> {
        let mut qb = chat_by_jid_query(jid, include_last_message);
        qb.build_query_as::<ChatRow>()
            .fetch_optional(&mut self.conn)
            .await?
            .map(Chat::try_from)
            .transpose()
    }

    pub async fn direct_chat_by_contact(&mut self, phone: &str) -> Result<Option<Chat>> {
        let mut qb = direct_chat_query(phone);
        qb.build_query_as::<ChatRow>()
            .fetch_optional(&mut self.conn)
            .await?
            .map(Chat::try_from)
            .transpose()
    }

    /// Chats involving `jid`: the chat with that JID, plus every chat it has
    /// posted in.
    pub async fn contact_chats(
        &mut self,
        scope: ChatScope,
        jid: &str,
        page: Pagination,
    ) -> Result<Vec<Chat>> {
        let mut qb = contact_chats_query(scope, jid, page);
        let rows = qb
            .build_query_as::<ChatRow>()
            .fetch_all(&mut self.conn)
            .await?;
        Ok(into_chats(rows))
    }

    pub async fn last_interaction(
        &mut self,
        scope: ChatScope,
        jid: &str,
    ) -> Result<Option<Message>> {
        let mut qb = last_interaction_query(scope, jid);
        qb.build_query_as::<MessageRow>()
            .fetch_optional(&mut self.conn)
            .await?
            .map(Message::try_from)
            .transpose()
    }

    /// Best display name for a sender JID: the chat with exactly that JID,
    /// then any chat whose JID contains its phone part, then the JID itself.
    pub async fn sender_display_name(&mut self, sender: &str) -> Result<String> {
        let exact: Option<(Option<String>,)> =
            sqlx::query_as("SELECT name FROM chats WHERE jid = ? LIMIT 1")
                .bind(sender)
                .fetch_optional(&mut self.conn)
                .await?;

        let found = match exact {
            found @ Some(_) => found,
            None => {
                sqlx::query_as(
                    "SELECT name FROM chats WHERE jid LIKE ? ESCAPE '\\' ORDER BY jid LIMIT 1",
                )
                .bind(like_pattern(jid::phone_part(sender)))
                .fetch_optional(&mut self.conn)
                .await?
            }
        };

        Ok(found
            .and_then(|(name,)| name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| sender.to_string()))
    }
}
