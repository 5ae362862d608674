use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub content: String,
    pub is_from_me: bool,
    pub chat_jid: String,
    pub id: String,
    pub chat_name: Option<String>,
    pub media_type: Option<String>,
}

/// Snapshot of the newest message of a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: String,
    pub content: Option<String>,
    pub sender: Option<String>,
    pub sender_name: Option<String>,
    pub is_from_me: Option<bool>,
    pub media_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub jid: String,
    pub name: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub is_allowed: bool,
    pub unread_count: Option<i64>,
    pub last_message: Option<LastMessage>,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        jid::is_group(&self.jid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub name: Option<String>,
    pub jid: String,
}

impl Contact {
    pub fn from_chat(jid: String, name: Option<String>) -> Self {
        Self {
            phone_number: jid::phone_part(&jid).to_string(),
            name,
            jid,
        }
    }
}

/// A message and its chronological neighbours in the same chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub message: Message,
    pub before: Vec<Message>,
    pub after: Vec<Message>,
}

impl MessageContext {
    /// before, message, after
    pub fn into_flat(self) -> Vec<Message> {
        let mut flat = self.before;
        flat.reserve(self.after.len() + 1);
        flat.push(self.message);
        flat.extend(self.after);
        flat
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub jid: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub message: Message,
    pub matched_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    Before,
    Match,
    After,
}

/// A message placed in a stitched context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedMessage {
    pub role: ContextRole,
    pub message: Message,
    /// Empty unless `role` is `Match`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "messages", rename_all = "snake_case")]
pub enum KeywordPage {
    Matches(Vec<KeywordMatch>),
    WithContext(Vec<TaggedMessage>),
}

impl KeywordPage {
    pub fn len(&self) -> usize {
        match self {
            KeywordPage::Matches(matches) => matches.len(),
            KeywordPage::WithContext(tagged) => tagged.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordResults {
    pub page: KeywordPage,
    /// Matches before pagination
    pub total_matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_chat_counts: Option<BTreeMap<String, usize>>,
}

impl Default for KeywordResults {
    fn default() -> Self {
        Self {
            page: KeywordPage::Matches(Vec::new()),
            total_matches: 0,
            per_chat_counts: None,
        }
    }
}
