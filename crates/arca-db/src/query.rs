//! Assembles the parameterised SELECTs behind every read.
//!
//! Builders only produce SQL and binds; running them is up to [`crate::ArchiveDb`].
//! Timestamps are compared through `julianday()` because the bridge does not
//! write them in one canonical textual form.

use arca_core::{
    ChatListQuery, ChatScope, ChatSort, InvalidFilter, MessageFilter, Pagination, jid, non_blank,
    parse_date_bound,
};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::rows::{CHAT_SELECT, CHAT_SELECT_WITH_LAST, MESSAGE_COLUMNS};

pub type SqliteQuery = QueryBuilder<'static, Sqlite>;

const MESSAGE_ORDER: &str =
    " ORDER BY julianday(messages.timestamp) DESC, messages.rowid DESC";

/// Messages matching `filter` inside `scope`, newest first.
///
/// `page` of `None` leaves the query unbounded.
pub fn message_query(
    scope: ChatScope,
    filter: &MessageFilter,
    page: Option<Pagination>,
) -> Result<SqliteQuery, InvalidFilter> {
    let after = non_blank(&filter.after)
        .map(|v| parse_date_bound("after", v))
        .transpose()?;
    let before = non_blank(&filter.before)
        .map(|v| parse_date_bound("before", v))
        .transpose()?;

    let mut qb = message_select();
    qb.push(" WHERE ");
    push_scope(&mut qb, scope);

    if let Some(after) = after {
        qb.push(" AND julianday(messages.timestamp) > julianday(")
            .push_bind(sql_time(after))
            .push(")");
    }

    if let Some(before) = before {
        qb.push(" AND julianday(messages.timestamp) < julianday(")
            .push_bind(sql_time(before))
            .push(")");
    }

    if let Some(sender) = non_blank(&filter.sender) {
        qb.push(" AND messages.sender = ").push_bind(sender.to_string());
    }

    if let Some(chat) = non_blank(&filter.chat_jid) {
        qb.push(" AND messages.chat_jid = ")
            .push_bind(jid::normalize_chat_jid(chat));
    }

    if let Some(text) = non_blank(&filter.query) {
        qb.push(" AND LOWER(messages.content) LIKE LOWER(")
            .push_bind(like_pattern(text))
            .push(") ESCAPE '\\'");
    }

    qb.push(MESSAGE_ORDER);
    if let Some(page) = page {
        push_page(&mut qb, page);
    }

    Ok(qb)
}

/// Newest message sent by `jid` or posted in chat `jid`.
pub fn last_interaction_query(scope: ChatScope, jid: &str) -> SqliteQuery {
    let mut qb = message_select();
    qb.push(" WHERE ");
    push_scope(&mut qb, scope);
    qb.push(" AND (messages.sender = ")
        .push_bind(jid.to_string())
        .push(" OR chats.jid = ")
        .push_bind(jid.to_string())
        .push(")");
    qb.push(MESSAGE_ORDER);
    qb.push(" LIMIT 1");
    qb
}

pub fn chat_list_query(scope: ChatScope, query: &ChatListQuery) -> SqliteQuery {
    let mut qb = chat_select(query.include_last_message);
    qb.push(" WHERE ");
    push_scope(&mut qb, scope);

    if let Some(text) = non_blank(&query.query) {
        push_name_or_jid_like(&mut qb, text);
    }

    match query.sort_by {
        ChatSort::LastActive => {
            qb.push(" ORDER BY julianday(chats.last_message_time) DESC, chats.jid ASC");
        }
        ChatSort::Name => {
            qb.push(" ORDER BY chats.name ASC, chats.jid ASC");
        }
    }

    push_page(&mut qb, query.page);
    qb
}

/// Direct chats only; groups are never contacts.
pub fn contact_query(query: &str, page: Pagination) -> SqliteQuery {
    let mut qb = QueryBuilder::new(
        "SELECT DISTINCT chats.jid AS jid, chats.name AS name FROM chats WHERE ",
    );
    push_scope(&mut qb, ChatScope::Allowed);
    push_not_group(&mut qb);

    let query = query.trim();
    if !query.is_empty() {
        push_name_or_jid_like(&mut qb, query);
    }

    qb.push(" ORDER BY chats.name ASC, chats.jid ASC");
    push_page(&mut qb, page);
    qb
}

pub fn chat_by_jid_query(jid: &str, include_last_message: bool) -> SqliteQuery {
    let mut qb = chat_select(include_last_message);
    qb.push(" WHERE ");
    push_scope(&mut qb, ChatScope::Allowed);
    qb.push(" AND chats.jid = ")
        .push_bind(jid::normalize_chat_jid(jid));
    qb
}

/// First direct chat whose JID contains `phone`.
pub fn direct_chat_query(phone: &str) -> SqliteQuery {
    let mut qb = chat_select(true);
    qb.push(" WHERE ");
    push_scope(&mut qb, ChatScope::Allowed);
    push_not_group(&mut qb);
    qb.push(" AND chats.jid LIKE ")
        .push_bind(like_pattern(phone.trim()))
        .push(" ESCAPE '\\'");
    qb.push(" ORDER BY chats.jid ASC LIMIT 1");
    qb
}

/// Chats that are `jid` itself or where `jid` has posted.
pub fn contact_chats_query(scope: ChatScope, jid: &str, page: Pagination) -> SqliteQuery {
    let mut qb = chat_select(true);
    qb.push(" WHERE ");
    push_scope(&mut qb, scope);
    qb.push(" AND (chats.jid = ")
        .push_bind(jid.to_string())
        .push(" OR EXISTS (SELECT 1 FROM messages sent")
        .push(" WHERE sent.chat_jid = chats.jid AND sent.sender = ")
        .push_bind(jid.to_string())
        .push("))");
    qb.push(" ORDER BY julianday(chats.last_message_time) DESC, chats.jid ASC");
    push_page(&mut qb, page);
    qb
}

fn message_select() -> SqliteQuery {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(MESSAGE_COLUMNS);
    qb.push(" FROM messages JOIN chats ON messages.chat_jid = chats.jid");
    qb
}

fn chat_select(include_last_message: bool) -> SqliteQuery {
    if include_last_message {
        QueryBuilder::new(CHAT_SELECT_WITH_LAST)
    } else {
        QueryBuilder::new(CHAT_SELECT)
    }
}

fn push_scope(qb: &mut SqliteQuery, scope: ChatScope) {
    qb.push("chats.is_allowed = 1");
    if scope.groups_only() {
        qb.push(format_args!(" AND chats.jid LIKE '%{}'", jid::GROUP_SUFFIX));
    }
}

fn push_not_group(qb: &mut SqliteQuery) {
    qb.push(format_args!(" AND chats.jid NOT LIKE '%{}'", jid::GROUP_SUFFIX));
}

fn push_name_or_jid_like(qb: &mut SqliteQuery, text: &str) {
    let pattern = like_pattern(text);
    qb.push(" AND (LOWER(chats.name) LIKE LOWER(")
        .push_bind(pattern.clone())
        .push(") ESCAPE '\\' OR LOWER(chats.jid) LIKE LOWER(")
        .push_bind(pattern)
        .push(") ESCAPE '\\')");
}

fn push_page(qb: &mut SqliteQuery, page: Pagination) {
    qb.push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(page.offset());
}

/// `%text%` with LIKE wildcards in `text` matched literally (escape `\`).
pub fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Instant in a form `julianday()` understands.
pub fn sql_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
