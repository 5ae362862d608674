use arca_core::{ChatScope, ContextPolicy, Message, MessageFilter, Pagination};
use futures::TryStreamExt;

use crate::error::Result;
use crate::query::message_query;
use crate::rows::{MessageRow, into_messages, readable};
use crate::store::ArchiveDb;

impl ArchiveDb {
    /// One page of messages matching `filter`, newest first.
    ///
    /// With context enabled each hit is replaced by its before-context, the
    /// hit, and its after-context, so the result can be longer than
    /// `page.limit`.
    pub async fn list_messages(
        &mut self,
        scope: ChatScope,
        filter: &MessageFilter,
        page: Pagination,
        context: ContextPolicy,
    ) -> Result<Vec<Message>> {
        let mut qb = message_query(scope, filter, Some(page))?;
        let rows = qb
            .build_query_as::<MessageRow>()
            .fetch_all(&mut self.conn)
            .await?;
        let messages = into_messages(rows);

        tracing::debug!(
            ?scope,
            limit = page.limit,
            page = page.page,
            hits = messages.len(),
            "Listed messages"
        );

        if !context.include_context || messages.is_empty() {
            return Ok(messages);
        }

        let mut stitched = Vec::with_capacity(
            messages.len() * (1 + context.before as usize + context.after as usize),
        );
        for message in &messages {
            let ctx = self
                .expand(&message.id, Some(&message.chat_jid), context.before, context.after)
                .await?;
            stitched.extend(ctx.into_flat());
        }
        Ok(stitched)
    }

    /// Feed every message matching `filter` to `visit`, newest first, without
    /// buffering the result set. Returns how many rows were visited.
    pub async fn scan_messages<F>(
        &mut self,
        scope: ChatScope,
        filter: &MessageFilter,
        mut visit: F,
    ) -> Result<usize>
    where
        F: FnMut(Message),
    {
        let mut qb = message_query(scope, filter, None)?;
        let mut rows = qb.build_query_as::<MessageRow>().fetch(&mut self.conn);

        let mut seen = 0;
        while let Some(row) = rows.try_next().await? {
            if let Some(message) = readable::<_, Message>(row) {
                visit(message);
                seen += 1;
            }
        }
        Ok(seen)
    }
}
