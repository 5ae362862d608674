use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidFilter;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const DEFAULT_CONTACT_LIMIT: u32 = 50;

/// Names the per-user store every operation runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidFilter> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed.contains("..")
            || trimmed.contains(['/', '\\', '\0'])
        {
            return Err(InvalidFilter::new("user_id", id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = InvalidFilter;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Which chats a read may see. Every scope requires `is_allowed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    Allowed,
    #[default]
    AllowedGroups,
}

impl ChatScope {
    pub fn groups_only(self) -> bool {
        matches!(self, ChatScope::AllowedGroups)
    }
}

/// Sparse message filters as handed in by adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    /// ISO-8601, exclusive
    pub after: Option<String>,
    /// ISO-8601, exclusive
    pub before: Option<String>,
    pub sender: Option<String>,
    pub chat_jid: Option<String>,
    /// Case-insensitive substring of the content
    pub query: Option<String>,
}

impl MessageFilter {
    pub fn for_chat(chat_jid: impl Into<String>) -> Self {
        Self {
            chat_jid: Some(chat_jid.into()),
            ..Self::default()
        }
    }
}

/// Blank strings count as "not given".
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Zero-indexed page of `limit` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub limit: u32,
    pub page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            page: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: u32, page: u32) -> Self {
        Self { limit, page }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.limit)
    }

    /// Slice `[page*limit, page*limit+limit)` of a list of `len` items.
    pub fn window(&self, len: usize) -> std::ops::Range<usize> {
        let start = (self.page as usize)
            .saturating_mul(self.limit as usize)
            .min(len);
        let end = start.saturating_add(self.limit as usize).min(len);
        start..end
    }
}

/// How many chronological neighbours to stitch around each result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPolicy {
    pub include_context: bool,
    pub before: u32,
    pub after: u32,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            include_context: true,
            before: 1,
            after: 1,
        }
    }
}

impl ContextPolicy {
    pub fn disabled() -> Self {
        Self {
            include_context: false,
            before: 0,
            after: 0,
        }
    }

    pub fn around(before: u32, after: u32) -> Self {
        Self {
            include_context: true,
            before,
            after,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSort {
    #[default]
    LastActive,
    Name,
}

impl FromStr for ChatSort {
    type Err = InvalidFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last_active" => Ok(ChatSort::LastActive),
            "name" => Ok(ChatSort::Name),
            other => Err(InvalidFilter::new("sort_by", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatListQuery {
    /// Case-insensitive substring of the chat name or JID
    pub query: Option<String>,
    pub sort_by: ChatSort,
    pub include_last_message: bool,
    pub page: Pagination,
}

impl Default for ChatListQuery {
    fn default() -> Self {
        Self {
            query: None,
            sort_by: ChatSort::default(),
            include_last_message: true,
            page: Pagination::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_path_escapes() {
        assert!(UserId::new("../other").is_err());
        assert!(UserId::new("a/b").is_err());
        assert!(UserId::new("  ").is_err());
        assert_eq!(UserId::new(" alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn user_id_deserializes_through_validation() {
        let ok: UserId = serde_json::from_str("\"4f1c\"").unwrap();
        assert_eq!(ok.as_str(), "4f1c");
        assert!(serde_json::from_str::<UserId>("\"..\"").is_err());
    }

    #[test]
    fn pagination_offset_is_page_times_limit() {
        assert_eq!(Pagination::new(10, 3).offset(), 30);
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn pagination_window_clamps_to_len() {
        assert_eq!(Pagination::new(10, 0).window(25), 0..10);
        assert_eq!(Pagination::new(10, 2).window(25), 20..25);
        assert_eq!(Pagination::new(10, 5).window(25), 25..25);
    }

    #[test]
    fn chat_sort_parses_known_values_only() {
        assert_eq!("name".parse::<ChatSort>(), Ok(ChatSort::Name));
        assert_eq!("last_active".parse::<ChatSort>(), Ok(ChatSort::LastActive));
        let err = "newest".parse::<ChatSort>().unwrap_err();
        assert_eq!(err.field, "sort_by");
    }

    #[test]
    fn non_blank_drops_whitespace() {
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" x ".into())), Some("x"));
        assert_eq!(non_blank(&None), None);
    }
}
