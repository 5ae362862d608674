use std::collections::BTreeMap;

use arca_core::{
    Chat, ChatListQuery, ChatScope, Contact, ContextPolicy, InvalidFilter, KeywordMatch,
    KeywordPage, KeywordResults, Message, MessageContext, MessageFilter, Pagination, UserId, jid,
};
use arca_db::{ArchiveDb, StoreLocator, StoreOptions};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::keywords::{self, KeywordRequest};

/// Read-only archive facade. Every call names its user and opens that user's
/// store for the duration of the call only.
#[derive(Debug, Clone)]
pub struct ArchiveService {
    locator: StoreLocator,
    options: StoreOptions,
    keyword_cap: u32,
}

impl ArchiveService {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            locator: config.locator(),
            options: config.store_options(),
            keyword_cap: config.keyword_candidate_cap,
        }
    }

    /// Most candidates a capped keyword filter reads per chat.
    pub fn keyword_cap(&self) -> u32 {
        self.keyword_cap
    }

    async fn open(&self, user: &UserId) -> Result<ArchiveDb> {
        let path = self.locator.path_for(user);
        let db = ArchiveDb::open(&path, &self.options).await?;
        tracing::info!(user = %user, path = %path.display(), "Store opened");
        Ok(db)
    }

    pub async fn list_messages(
        &self,
        user: &UserId,
        scope: ChatScope,
        filter: &MessageFilter,
        page: Pagination,
        context: ContextPolicy,
    ) -> Result<Vec<Message>> {
        tracing::debug!(user = %user, ?scope, ?filter, ?page, "list_messages");

        let result = async {
            let mut db = self.open(user).await?;
            let messages = db.list_messages(scope, filter, page, context).await;
            db.close().await;
            Ok::<_, ArchiveError>(messages?)
        }
        .await;

        degrade("list_messages", user, result, Vec::new)
    }

    /// No empty form exists for a context, so an unreadable store is an error
    /// here rather than an empty result.
    pub async fn message_context(
        &self,
        user: &UserId,
        message_id: &str,
        before: u32,
        after: u32,
    ) -> Result<MessageContext> {
        tracing::debug!(user = %user, message_id, before, after, "message_context");

        let mut db = self.open(user).await?;
        let ctx = db.message_context(message_id, before, after).await;
        db.close().await;
        Ok(ctx?)
    }

    pub async fn list_chats(
        &self,
        user: &UserId,
        scope: ChatScope,
        query: &ChatListQuery,
    ) -> Result<Vec<Chat>> {
        tracing::debug!(user = %user, ?scope, ?query, "list_chats");

        let result = async {
            let mut db = self.open(user).await?;
            let chats = db.list_chats(scope, query).await;
            db.close().await;
            Ok::<_, ArchiveError>(chats?)
        }
        .await;

        degrade("list_chats", user, result, Vec::new)
    }

    pub async fn search_contacts(
        &self,
        user: &UserId,
        query: &str,
        page: Pagination,
    ) -> Result<Vec<Contact>> {
        tracing::debug!(user = %user, query, ?page, "search_contacts");

        let result = async {
            let mut db = self.open(user).await?;
            let contacts = db.search_contacts(query, page).await;
            db.close().await;
            Ok::<_, ArchiveError>(contacts?)
        }
        .await;

        degrade("search_contacts", user, result, Vec::new)
    }

    pub async fn get_chat(
        &self,
        user: &UserId,
        jid: &str,
        include_last_message: bool,
    ) -> Result<Option<Chat>> {
        let result = async {
            let mut db = self.open(user).await?;
            let chat = db.get_chat(jid, include_last_message).await;
            db.close().await;
            Ok::<_, ArchiveError>(chat?)
        }
        .await;

        degrade("get_chat", user, result, || None)
    }

    pub async fn direct_chat_by_contact(&self, user: &UserId, phone: &str) -> Result<Option<Chat>> {
        let result = async {
            let mut db = self.open(user).await?;
            let chat = db.direct_chat_by_contact(phone).await;
            db.close().await;
            Ok::<_, ArchiveError>(chat?)
        }
        .await;

        degrade("direct_chat_by_contact", user, result, || None)
    }

    pub async fn contact_chats(
        &self,
        user: &UserId,
        scope: ChatScope,
        jid: &str,
        page: Pagination,
    ) -> Result<Vec<Chat>> {
        let result = async {
            let mut db = self.open(user).await?;
            let chats = db.contact_chats(scope, jid, page).await;
            db.close().await;
            Ok::<_, ArchiveError>(chats?)
        }
        .await;

        degrade("contact_chats", user, result, Vec::new)
    }

    pub async fn last_interaction(
        &self,
        user: &UserId,
        scope: ChatScope,
        jid: &str,
    ) -> Result<Option<Message>> {
        let result = async {
            let mut db = self.open(user).await?;
            let message = db.last_interaction(scope, jid).await;
            db.close().await;
            Ok::<_, ArchiveError>(message?)
        }
        .await;

        degrade("last_interaction", user, result, || None)
    }

    /// Chat name for `sender`, or `sender` itself when there is none or the
    /// store cannot be read.
    pub async fn sender_display_name(&self, user: &UserId, sender: &str) -> String {
        let result = async {
            let mut db = self.open(user).await?;
            let name = db.sender_display_name(sender).await;
            db.close().await;
            Ok::<_, ArchiveError>(name?)
        }
        .await;

        match result {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user = %user, sender, error = %e, "Sender name lookup failed");
                sender.to_string()
            }
        }
    }

    /// Messages containing any of the requested keywords, newest first.
    ///
    /// At most [`Self::keyword_cap`] candidates are read, so older matches
    /// past the cap are not seen. See [`Self::filter_by_keywords_streaming`].
    pub async fn filter_by_keywords(
        &self,
        user: &UserId,
        request: &KeywordRequest,
    ) -> Result<KeywordResults> {
        let set = request.keyword_set()?;
        tracing::debug!(
            user = %user,
            keywords = ?set.keywords(),
            filter = ?request.filter,
            "filter_by_keywords"
        );

        let result = async {
            let mut db = self.open(user).await?;
            let results = async {
                let candidates =
                    keywords::candidates(&mut db, request.scope, &request.filter, self.keyword_cap)
                        .await?;
                let matches = keywords::match_messages(candidates, &set);
                finish(&mut db, matches, request, None).await
            }
            .await;
            db.close().await;
            results
        }
        .await;

        degrade("filter_by_keywords", user, result, KeywordResults::default)
    }

    /// Keyword filter over several chats, one capped candidate read per chat.
    /// Matches carry their chat and `per_chat_counts` has an entry for every
    /// requested identifier.
    pub async fn filter_by_keywords_in_chats(
        &self,
        user: &UserId,
        chat_jids: &[String],
        request: &KeywordRequest,
    ) -> Result<KeywordResults> {
        if chat_jids.is_empty() {
            return Err(InvalidFilter::new("chat_jids", "").into());
        }
        let set = request.keyword_set()?;
        let chats = keywords::distinct_chats(chat_jids);
        tracing::debug!(
            user = %user,
            chats = chats.len(),
            keywords = ?set.keywords(),
            "filter_by_keywords_in_chats"
        );

        let result = async {
            let mut db = self.open(user).await?;
            let results = async {
                let mut counts: BTreeMap<String, usize> =
                    chat_jids.iter().map(|jid| (jid.clone(), 0)).collect();
                let mut matches = Vec::new();

                for chat in &chats {
                    let filter = MessageFilter {
                        chat_jid: Some(chat.clone()),
                        ..request.filter.clone()
                    };
                    let candidates =
                        keywords::candidates(&mut db, request.scope, &filter, self.keyword_cap)
                            .await?;
                    let hits = keywords::match_messages(candidates, &set);

                    // Every spelling the caller used for this chat gets its count
                    for (requested, count) in counts.iter_mut() {
                        if jid::normalize_chat_jid(requested) == *chat {
                            *count = hits.len();
                        }
                    }
                    matches.extend(hits.into_iter().map(|mut hit| {
                        hit.chat = Some(keywords::chat_ref(&hit.message));
                        hit
                    }));
                }

                finish(&mut db, matches, request, Some(counts)).await
            }
            .await;
            db.close().await;
            results
        }
        .await;

        degrade("filter_by_keywords_in_chats", user, result, KeywordResults::default)
    }

    /// Same results as [`Self::filter_by_keywords`] without the candidate
    /// cap: rows are streamed and only matches are kept in memory.
    pub async fn filter_by_keywords_streaming(
        &self,
        user: &UserId,
        request: &KeywordRequest,
    ) -> Result<KeywordResults> {
        let set = request.keyword_set()?;
        tracing::debug!(user = %user, keywords = ?set.keywords(), "filter_by_keywords_streaming");

        let result = async {
            let mut db = self.open(user).await?;
            let results = async {
                let mut matches = Vec::new();
                let scanned = db
                    .scan_messages(request.scope, &request.filter, |message| {
                        matches.extend(set.match_message(message));
                    })
                    .await?;
                tracing::debug!(scanned, matched = matches.len(), "Keyword scan finished");
                finish(&mut db, matches, request, None).await
            }
            .await;
            db.close().await;
            results
        }
        .await;

        degrade("filter_by_keywords_streaming", user, result, KeywordResults::default)
    }
}

/// Rank, paginate and, if asked, stitch context around the page.
async fn finish(
    db: &mut ArchiveDb,
    mut matches: Vec<KeywordMatch>,
    request: &KeywordRequest,
    per_chat_counts: Option<BTreeMap<String, usize>>,
) -> Result<KeywordResults> {
    keywords::rank(&mut matches);
    let total_matches = matches.len();
    let page = keywords::take_page(matches, request.page);

    let page = if request.context.include_context {
        KeywordPage::WithContext(keywords::tag_context(db, page, request.context).await?)
    } else {
        KeywordPage::Matches(page)
    };

    Ok(KeywordResults {
        page,
        total_matches,
        per_chat_counts,
    })
}

/// Unreadable stores read as empty; every other error is the caller's.
fn degrade<T>(
    op: &'static str,
    user: &UserId,
    result: Result<T>,
    empty: impl FnOnce() -> T,
) -> Result<T> {
    match result {
        Err(ArchiveError::StoreUnavailable(e)) => {
            tracing::warn!(
                user = %user,
                op,
                error = %e,
                "Store unavailable, returning empty result"
            );
            Ok(empty())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use arca_core::{ContextRole, KeywordPage};
    use arca_db::testing::{NewMessage, StoreWriter};

    use super::*;

    const G1: &str = "g1@g.us";
    const G2: &str = "g2@g.us";
    const SECRET: &str = "secret@g.us";
    const ANA: &str = "5511999999999@s.whatsapp.net";

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn service(root: &Path, cap: u32) -> ArchiveService {
        ArchiveService::new(&ArchiveConfig {
            store_root: root.to_path_buf(),
            keyword_candidate_cap: cap,
            ..ArchiveConfig::default()
        })
    }

    async fn seed(root: &Path) {
        let mut w = StoreWriter::create(&root.join("alice").join("messages.db")).await;
        w.chat(G1, Some("G1"), true).await;
        w.chat(G2, Some("G2"), true).await;
        w.chat(SECRET, Some("Secret"), false).await;
        w.chat(ANA, Some("Ana"), true).await;

        w.message(NewMessage::new("t1", G1, ANA, "good morning", "2024-05-01 10:00:00+00:00"))
            .await;
        w.message(NewMessage::new("t2", G1, ANA, "this is urgent", "2024-05-01 10:01:00+00:00"))
            .await;
        w.message(NewMessage::new("t3", G1, ANA, "on it", "2024-05-01 10:02:00+00:00")).await;
        w.message(NewMessage::new(
            "s1",
            SECRET,
            ANA,
            "urgent and hidden",
            "2024-05-01 10:03:00+00:00",
        ))
        .await;
        w.message(NewMessage::new("g2-1", G2, ANA, "Urgent: standup", "2024-05-01 09:00:00+00:00"))
            .await;
        w.message(NewMessage::new("g2-2", G2, ANA, "also URGENT", "2024-05-01 11:00:00+00:00"))
            .await;
        w.finish().await;
    }

    fn tagged_ids(results: &KeywordResults) -> Vec<(ContextRole, &str)> {
        match &results.page {
            KeywordPage::WithContext(tagged) => tagged
                .iter()
                .map(|t| (t.role, t.message.id.as_str()))
                .collect(),
            KeywordPage::Matches(_) => panic!("expected context"),
        }
    }

    fn match_ids(results: &KeywordResults) -> Vec<&str> {
        match &results.page {
            KeywordPage::Matches(hits) => hits.iter().map(|h| h.message.id.as_str()).collect(),
            KeywordPage::WithContext(_) => panic!("expected bare matches"),
        }
    }

    #[tokio::test]
    async fn keyword_match_is_wrapped_in_its_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let request = KeywordRequest {
            filter: MessageFilter::for_chat(G1),
            context: ContextPolicy::around(1, 1),
            ..KeywordRequest::new(["urgent"])
        };
        let results = svc.filter_by_keywords(&user(), &request).await.unwrap();

        assert_eq!(results.total_matches, 1);
        assert_eq!(
            tagged_ids(&results),
            [
                (ContextRole::Before, "t1"),
                (ContextRole::Match, "t2"),
                (ContextRole::After, "t3"),
            ]
        );
        if let KeywordPage::WithContext(tagged) = &results.page {
            assert_eq!(tagged[1].matched_keywords, ["urgent"]);
            assert!(tagged[0].matched_keywords.is_empty());
        }
    }

    #[tokio::test]
    async fn keyword_results_skip_disallowed_chats_and_rank_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let request = KeywordRequest {
            context: ContextPolicy::disabled(),
            ..KeywordRequest::new(["urgent"])
        };
        let results = svc.filter_by_keywords(&user(), &request).await.unwrap();
        assert_eq!(match_ids(&results), ["g2-2", "t2", "g2-1"]);
        assert_eq!(results.total_matches, 3);

        let exact = KeywordRequest {
            case_sensitive: true,
            ..request.clone()
        };
        let results = svc.filter_by_keywords(&user(), &exact).await.unwrap();
        assert_eq!(match_ids(&results), ["t2"]);

        let second_page = KeywordRequest {
            page: Pagination::new(2, 1),
            ..request
        };
        let results = svc.filter_by_keywords(&user(), &second_page).await.unwrap();
        assert_eq!(match_ids(&results), ["g2-1"]);
        assert_eq!(results.total_matches, 3);
    }

    #[tokio::test]
    async fn candidate_cap_bounds_the_capped_path_only() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 1);

        let request = KeywordRequest {
            context: ContextPolicy::disabled(),
            ..KeywordRequest::new(["urgent"])
        };

        let capped = svc.filter_by_keywords(&user(), &request).await.unwrap();
        assert_eq!(match_ids(&capped), ["g2-2"]);

        let streamed = svc.filter_by_keywords_streaming(&user(), &request).await.unwrap();
        assert_eq!(match_ids(&streamed), ["g2-2", "t2", "g2-1"]);
        assert_eq!(streamed.total_matches, 3);
    }

    #[tokio::test]
    async fn multi_chat_counts_every_requested_chat() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let chats = vec![G1.to_string(), G2.to_string(), SECRET.to_string(), ANA.to_string()];
        let request = KeywordRequest {
            context: ContextPolicy::disabled(),
            ..KeywordRequest::new(["urgent"])
        };
        let results = svc
            .filter_by_keywords_in_chats(&user(), &chats, &request)
            .await
            .unwrap();

        let counts = results.per_chat_counts.as_ref().expect("counts");
        assert_eq!(counts[G1], 1);
        assert_eq!(counts[G2], 2);
        assert_eq!(counts[SECRET], 0);
        assert_eq!(counts[ANA], 0);

        let KeywordPage::Matches(hits) = &results.page else {
            panic!("expected bare matches");
        };
        assert_eq!(hits.len(), 3);
        let first = hits[0].chat.as_ref().expect("chat ref");
        assert_eq!(first.jid, G2);
        assert_eq!(first.name.as_deref(), Some("G2"));
    }

    #[tokio::test]
    async fn invalid_requests_fail_before_touching_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), 10_000);

        let err = svc
            .filter_by_keywords_in_chats(&user(), &[], &KeywordRequest::new(["urgent"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFilter(f) if f.field == "chat_jids"));

        let err = svc
            .filter_by_keywords(&user(), &KeywordRequest::new([" "]))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFilter(f) if f.field == "keywords"));
    }

    #[tokio::test]
    async fn bad_dates_surface_even_when_the_store_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let filter = MessageFilter {
            after: Some("not a date".into()),
            ..MessageFilter::default()
        };
        let err = svc
            .list_messages(
                &user(),
                ChatScope::Allowed,
                &filter,
                Pagination::default(),
                ContextPolicy::disabled(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFilter(f) if f.field == "after"));
    }

    #[tokio::test]
    async fn missing_store_degrades_listings_and_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), 10_000);
        let nobody = UserId::new("nobody").unwrap();

        let messages = svc
            .list_messages(
                &nobody,
                ChatScope::default(),
                &MessageFilter::default(),
                Pagination::default(),
                ContextPolicy::default(),
            )
            .await
            .unwrap();
        assert!(messages.is_empty());

        let chats = svc
            .list_chats(&nobody, ChatScope::default(), &ChatListQuery::default())
            .await
            .unwrap();
        assert!(chats.is_empty());

        let contacts = svc
            .search_contacts(&nobody, "ana", Pagination::default())
            .await
            .unwrap();
        assert!(contacts.is_empty());
        assert!(svc.get_chat(&nobody, ANA, true).await.unwrap().is_none());
        assert!(svc.last_interaction(&nobody, ChatScope::Allowed, ANA).await.unwrap().is_none());
        assert_eq!(svc.sender_display_name(&nobody, ANA).await, ANA);

        let results = svc
            .filter_by_keywords(&nobody, &KeywordRequest::new(["urgent"]))
            .await
            .unwrap();
        assert!(results.page.is_empty());
        assert_eq!(results.total_matches, 0);

        let err = svc.message_context(&nobody, "t2", 1, 1).await.unwrap_err();
        assert!(matches!(err, ArchiveError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn context_lookup_through_the_service() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let ctx = svc.message_context(&user(), "t2", 1, 1).await.unwrap();
        assert_eq!(ctx.before[0].id, "t1");
        assert_eq!(ctx.after[0].id, "t3");

        let err = svc.message_context(&user(), "missing", 1, 1).await.unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { message_id } if message_id == "missing"));

        assert_eq!(svc.sender_display_name(&user(), ANA).await, "Ana");
    }

    #[tokio::test]
    async fn repeated_chats_are_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let svc = service(dir.path(), 10_000);

        let chats = vec![G1.to_string(), G2.to_string(), G1.to_string()];
        let request = KeywordRequest {
            context: ContextPolicy::disabled(),
            ..KeywordRequest::new(["urgent"])
        };
        let results = svc
            .filter_by_keywords_in_chats(&user(), &chats, &request)
            .await
            .unwrap();

        assert_eq!(results.total_matches, 3);
        assert_eq!(match_ids(&results), ["g2-2", "t2", "g2-1"]);
        let counts = results.per_chat_counts.as_ref().expect("counts");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[G1], 1);
        assert_eq!(counts[G2], 2);
    }

    #[tokio::test]
    async fn unreadable_row_does_not_empty_listings() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).await;
        let mut w = StoreWriter::create(&dir.path().join("alice").join("messages.db")).await;
        w.message(NewMessage::new("bad", G1, ANA, "urgent but garbled", "not-a-time")).await;
        w.finish().await;
        let svc = service(dir.path(), 10_000);

        let messages = svc
            .list_messages(
                &user(),
                ChatScope::AllowedGroups,
                &MessageFilter::for_chat(G1),
                Pagination::default(),
                ContextPolicy::disabled(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["t3", "t2", "t1"]);

        let request = KeywordRequest {
            context: ContextPolicy::disabled(),
            ..KeywordRequest::new(["urgent"])
        };
        let capped = svc.filter_by_keywords(&user(), &request).await.unwrap();
        assert_eq!(match_ids(&capped), ["g2-2", "t2", "g2-1"]);

        let streamed = svc
            .filter_by_keywords_streaming(&user(), &request)
            .await
            .unwrap();
        assert_eq!(streamed.total_matches, 3);

        let err = svc.message_context(&user(), "bad", 1, 1).await.unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptRow(_)));
    }
}
