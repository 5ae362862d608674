//! Keyword filtering over message listings.
//!
//! Candidates come from the message lister with context disabled; matching,
//! ordering and pagination happen in memory, then context is stitched around
//! the surviving page only.

use arca_core::{
    ChatRef, ChatScope, ContextPolicy, ContextRole, InvalidFilter, KeywordMatch, Message,
    MessageFilter, Pagination, TaggedMessage, jid,
};
use arca_db::{ArchiveDb, DbError};

/// Trimmed, non-empty keywords in request order.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<String>,
    needles: Vec<String>,
    case_sensitive: bool,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I, case_sensitive: bool) -> Result<Self, InvalidFilter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        let mut raw = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref();
            raw.push(keyword.to_string());
            let trimmed = keyword.trim();
            if !trimmed.is_empty() && !kept.iter().any(|k| k == trimmed) {
                kept.push(trimmed.to_string());
            }
        }

        if kept.is_empty() {
            return Err(InvalidFilter::new("keywords", raw.join(",")));
        }

        let needles = kept
            .iter()
            .map(|k| if case_sensitive { k.clone() } else { k.to_lowercase() })
            .collect();

        Ok(Self {
            keywords: kept,
            needles,
            case_sensitive,
        })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Keywords found in `content`, in request order.
    pub fn matches_in(&self, content: &str) -> Vec<String> {
        let folded;
        let haystack = if self.case_sensitive {
            content
        } else {
            folded = content.to_lowercase();
            folded.as_str()
        };

        self.keywords
            .iter()
            .zip(&self.needles)
            .filter(|(_, needle)| haystack.contains(needle.as_str()))
            .map(|(keyword, _)| keyword.clone())
            .collect()
    }

    pub fn match_message(&self, message: Message) -> Option<KeywordMatch> {
        let matched_keywords = self.matches_in(&message.content);
        if matched_keywords.is_empty() {
            return None;
        }
        Some(KeywordMatch {
            message,
            matched_keywords,
            chat: None,
        })
    }
}

/// Keep the messages containing at least one keyword. Input order is kept,
/// so feeding the output back in yields the same matches.
pub fn match_messages<I>(messages: I, keywords: &KeywordSet) -> Vec<KeywordMatch>
where
    I: IntoIterator<Item = Message>,
{
    messages
        .into_iter()
        .filter_map(|m| keywords.match_message(m))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct KeywordRequest {
    pub keywords: Vec<String>,
    pub filter: MessageFilter,
    pub scope: ChatScope,
    pub case_sensitive: bool,
    pub context: ContextPolicy,
    pub page: Pagination,
}

impl KeywordRequest {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn keyword_set(&self) -> Result<KeywordSet, InvalidFilter> {
        KeywordSet::new(&self.keywords, self.case_sensitive)
    }
}

/// Newest first; equal timestamps keep candidate order.
pub(crate) fn rank(matches: &mut [KeywordMatch]) {
    matches.sort_by(|a, b| b.message.timestamp.cmp(&a.message.timestamp));
}

pub(crate) fn take_page(mut matches: Vec<KeywordMatch>, page: Pagination) -> Vec<KeywordMatch> {
    let window = page.window(matches.len());
    matches.truncate(window.end);
    matches.drain(..window.start);
    matches
}

/// Normalised chat JIDs in first-seen order, each once.
pub(crate) fn distinct_chats(chat_jids: &[String]) -> Vec<String> {
    let mut chats: Vec<String> = Vec::with_capacity(chat_jids.len());
    for requested in chat_jids {
        let chat = jid::normalize_chat_jid(requested);
        if !chats.contains(&chat) {
            chats.push(chat);
        }
    }
    chats
}

pub(crate) fn chat_ref(message: &Message) -> ChatRef {
    ChatRef {
        jid: message.chat_jid.clone(),
        name: message.chat_name.clone(),
    }
}

/// Candidate read for one keyword pass: bounded by `cap`, no context.
pub(crate) async fn candidates(
    db: &mut ArchiveDb,
    scope: ChatScope,
    filter: &MessageFilter,
    cap: u32,
) -> Result<Vec<Message>, DbError> {
    db.list_messages(scope, filter, Pagination::new(cap, 0), ContextPolicy::disabled())
        .await
}

/// Stitch `policy` neighbours around every match, in match order.
pub(crate) async fn tag_context(
    db: &mut ArchiveDb,
    matches: Vec<KeywordMatch>,
    policy: ContextPolicy,
) -> Result<Vec<TaggedMessage>, DbError> {
    let mut tagged = Vec::new();

    for hit in matches {
        let ctx = match db
            .message_context_in_chat(
                &hit.message.id,
                &hit.message.chat_jid,
                policy.before,
                policy.after,
            )
            .await
        {
            Ok(ctx) => ctx,
            Err(DbError::MessageNotFound(id)) => {
                tracing::debug!(message_id = %id, "Match vanished before context expansion");
                tagged.push(tagged_match(hit));
                continue;
            }
            Err(e) => return Err(e),
        };

        tagged.extend(ctx.before.into_iter().map(|m| neighbour(ContextRole::Before, m)));
        tagged.push(tagged_match(hit));
        tagged.extend(ctx.after.into_iter().map(|m| neighbour(ContextRole::After, m)));
    }

    Ok(tagged)
}

fn tagged_match(hit: KeywordMatch) -> TaggedMessage {
    TaggedMessage {
        role: ContextRole::Match,
        message: hit.message,
        matched_keywords: hit.matched_keywords,
    }
}

fn neighbour(role: ContextRole, message: Message) -> TaggedMessage {
    TaggedMessage {
        role,
        message,
        matched_keywords: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, minute: u32, content: &str) -> Message {
        Message {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
            sender: "5511999999999@s.whatsapp.net".into(),
            content: content.into(),
            is_from_me: false,
            chat_jid: "g1@g.us".into(),
            id: id.into(),
            chat_name: Some("G1".into()),
            media_type: None,
        }
    }

    #[test]
    fn blank_keywords_are_rejected() {
        let err = KeywordSet::new(["  ", ""], false).unwrap_err();
        assert_eq!(err.field, "keywords");

        let none: [&str; 0] = [];
        assert!(KeywordSet::new(none, false).is_err());
    }

    #[test]
    fn keywords_are_trimmed_and_deduplicated() {
        let set = KeywordSet::new([" urgent ", "urgent", "asap"], false).unwrap();
        assert_eq!(set.keywords(), ["urgent", "asap"]);
    }

    #[test]
    fn case_sensitivity_is_honoured() {
        let messages = || {
            vec![
                message("m1", 1, "Meeting at 10"),
                message("m2", 2, "meeting later"),
            ]
        };

        let exact = KeywordSet::new(["Meeting"], true).unwrap();
        let hits = match_messages(messages(), &exact);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.id, "m1");

        let folded = KeywordSet::new(["Meeting"], false).unwrap();
        let hits = match_messages(messages(), &folded);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.matched_keywords == ["Meeting"]));
    }

    #[test]
    fn matched_subset_follows_request_order() {
        let set = KeywordSet::new(["deploy", "urgent", "lunch"], false).unwrap();
        let hit = set
            .match_message(message("m1", 1, "URGENT: deploy now"))
            .expect("should match");
        assert_eq!(hit.matched_keywords, ["deploy", "urgent"]);
        assert!(set.match_message(message("m2", 2, "nothing here")).is_none());
    }

    #[test]
    fn matching_is_idempotent() {
        let set = KeywordSet::new(["urgent", "call"], false).unwrap();
        let messages = vec![
            message("m1", 1, "urgent"),
            message("m2", 2, "hello"),
            message("m3", 3, "Call me"),
            message("m4", 4, "urgently call"),
        ];

        let once = match_messages(messages, &set);
        let twice = match_messages(once.iter().map(|h| h.message.clone()), &set);
        assert_eq!(once, twice);
    }

    #[test]
    fn repeated_chats_are_fetched_once() {
        let requested = vec![
            "g1@g.us".to_string(),
            "5511999999999".to_string(),
            "g1@g.us".to_string(),
            "5511999999999@s.whatsapp.net".to_string(),
        ];
        assert_eq!(
            distinct_chats(&requested),
            ["g1@g.us", "5511999999999@s.whatsapp.net"]
        );
    }

    #[test]
    fn ranking_is_stable_and_pages_are_disjoint() {
        let set = KeywordSet::new(["x"], false).unwrap();
        let mut hits = match_messages(
            vec![
                message("old", 1, "x"),
                message("tie-a", 5, "x"),
                message("tie-b", 5, "x"),
                message("new", 9, "x"),
            ],
            &set,
        );
        rank(&mut hits);
        let order: Vec<_> = hits.iter().map(|h| h.message.id.as_str()).collect();
        assert_eq!(order, ["new", "tie-a", "tie-b", "old"]);

        let first = take_page(hits.clone(), Pagination::new(3, 0));
        let second = take_page(hits.clone(), Pagination::new(3, 1));
        let beyond = take_page(hits, Pagination::new(3, 5));
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message.id, "old");
        assert!(beyond.is_empty());
    }
}
