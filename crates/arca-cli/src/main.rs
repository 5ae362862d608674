use std::io::{self, Write};

use arca_service::{
    ArchiveConfig, ArchiveService, Chat, ChatListQuery, ChatScope, ChatSort, ContextPolicy,
    ContextRole, DEFAULT_CONTACT_LIMIT, KeywordPage, KeywordRequest, KeywordResults, Message,
    MessageFilter, Pagination, UserId, format_message, jid,
};
use color_eyre::eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Human,
    Json,
}

struct Session {
    service: ArchiveService,
    user: UserId,
    output: Output,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .from_env_lossy()
                .add_directive("arca_cli=info".parse()?)
                .add_directive("arca_service=info".parse()?)
                .add_directive("arca_db=info".parse()?),
        )
        .init();

    let config = ArchiveConfig::from_env().wrap_err("Invalid configuration")?;
    println!("📁 Store root: {}", config.store_root.display());

    let output = match std::env::var("ARCA_OUTPUT") {
        Ok(v) if v.eq_ignore_ascii_case("json") => Output::Json,
        _ => Output::Human,
    };

    let user = UserId::new(read_line("User ID: ")?).wrap_err("Invalid user id")?;
    let session = Session {
        service: ArchiveService::new(&config),
        user,
        output,
    };
    tracing::info!(user = %session.user, ?output, "Session started");

    loop {
        print_menu();
        let choice = read_line("Choice: ")?;

        let result = match choice.trim() {
            "1" => list_chats(&session).await,
            "2" => search_contacts(&session).await,
            "3" => list_messages(&session).await,
            "4" => message_context(&session).await,
            "5" => filter_keywords(&session).await,
            "6" => filter_keywords_in_chats(&session).await,
            "7" => chat_details(&session).await,
            "8" => direct_chat(&session).await,
            "9" => contact_chats(&session).await,
            "10" => last_interaction(&session).await,
            "0" => {
                println!("👋 Bye");
                break;
            }
            _ => {
                println!("❌ Invalid choice");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("❌ {}", e);
        }
    }

    Ok(())
}

fn print_menu() {
    println!();
    println!("╔════════════════════════════════════╗");
    println!("║        ARCA - WhatsApp archive     ║");
    println!("╠════════════════════════════════════╣");
    println!("║  1. List Chats                     ║");
    println!("║  2. Search Contacts                ║");
    println!("║  3. List Messages                  ║");
    println!("║  4. Message Context                ║");
    println!("║  5. Keyword Filter                 ║");
    println!("║  6. Keyword Filter (many chats)    ║");
    println!("║  7. Chat Details                   ║");
    println!("║  8. Direct Chat by Phone           ║");
    println!("║  9. Chats with Contact             ║");
    println!("║ 10. Last Interaction               ║");
    println!("║  0. Exit                           ║");
    println!("╚════════════════════════════════════╝");
}

async fn list_chats(session: &Session) -> Result<()> {
    let query = read_optional("Name or JID contains (empty for all): ")?;
    let sort_by = match read_optional("Sort by [last_active|name]: ")? {
        Some(s) => s.parse::<ChatSort>()?,
        None => ChatSort::default(),
    };
    let scope = read_scope()?;
    let page = read_page(Pagination::default())?;

    let request = ChatListQuery {
        query,
        sort_by,
        page,
        ..ChatListQuery::default()
    };
    let chats = session
        .service
        .list_chats(&session.user, scope, &request)
        .await?;

    if session.output == Output::Json {
        return print_json(&chats);
    }

    if chats.is_empty() {
        println!("📭 No chats found");
    } else {
        println!("\n💬 Chats ({}):", chats.len());
        for chat in &chats {
            print_chat(chat);
        }
    }
    Ok(())
}

async fn search_contacts(session: &Session) -> Result<()> {
    let query = read_line("Name or phone contains: ")?;
    let page = read_page(Pagination::new(DEFAULT_CONTACT_LIMIT, 0))?;
    let contacts = session
        .service
        .search_contacts(&session.user, &query, page)
        .await?;

    if session.output == Output::Json {
        return print_json(&contacts);
    }

    if contacts.is_empty() {
        println!("📭 No contacts found");
    } else {
        println!("\n📇 Contacts ({}):", contacts.len());
        for contact in &contacts {
            println!(
                "  📱 {} - {}",
                jid::format_phone_number(&contact.phone_number),
                contact.name.as_deref().unwrap_or("?")
            );
        }
    }
    Ok(())
}

async fn list_messages(session: &Session) -> Result<()> {
    let filter = MessageFilter {
        after: read_optional("After (ISO date, empty for none): ")?,
        before: read_optional("Before (ISO date, empty for none): ")?,
        sender: read_optional("Sender JID (empty for any): ")?,
        chat_jid: read_optional("Chat JID or phone (empty for all): ")?,
        query: read_optional("Text contains (empty for any): ")?,
    };
    let scope = read_scope()?;
    let page = read_page(Pagination::default())?;
    let context = read_context()?;

    let messages = session
        .service
        .list_messages(&session.user, scope, &filter, page, context)
        .await?;

    if session.output == Output::Json {
        return print_json(&messages);
    }

    if messages.is_empty() {
        println!("📭 No messages found");
    } else {
        println!("\n💬 Messages ({}):", messages.len());
        for msg in &messages {
            print_message(session, msg).await;
        }
    }
    Ok(())
}

async fn message_context(session: &Session) -> Result<()> {
    let id = read_line("Message ID: ")?;
    let before = read_number("Messages before [5]: ", 5)?;
    let after = read_number("Messages after [5]: ", 5)?;

    let ctx = session
        .service
        .message_context(&session.user, &id, before, after)
        .await?;

    if session.output == Output::Json {
        return print_json(&ctx);
    }

    for msg in &ctx.before {
        print!("{} ", role_tag(ContextRole::Before));
        print_message(session, msg).await;
    }
    print!("{} ", role_tag(ContextRole::Match));
    print_message(session, &ctx.message).await;
    for msg in &ctx.after {
        print!("{} ", role_tag(ContextRole::After));
        print_message(session, msg).await;
    }
    Ok(())
}

async fn filter_keywords(session: &Session) -> Result<()> {
    let request = read_keyword_request(true)?;
    let streaming = read_yes_no(
        &format!(
            "Scan whole archive instead of the newest {} messages? [y/N]: ",
            session.service.keyword_cap()
        ),
        false,
    )?;

    let results = if streaming {
        session
            .service
            .filter_by_keywords_streaming(&session.user, &request)
            .await?
    } else {
        session
            .service
            .filter_by_keywords(&session.user, &request)
            .await?
    };

    print_keyword_results(session, &results).await
}

async fn filter_keywords_in_chats(session: &Session) -> Result<()> {
    let chats: Vec<String> = read_line("Chat JIDs (comma separated): ")?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let request = read_keyword_request(false)?;

    let results = session
        .service
        .filter_by_keywords_in_chats(&session.user, &chats, &request)
        .await?;

    print_keyword_results(session, &results).await
}

async fn chat_details(session: &Session) -> Result<()> {
    let jid = read_line("Chat JID or phone: ")?;
    let chat = session.service.get_chat(&session.user, &jid, true).await?;
    print_optional_chat(session, chat)
}

async fn direct_chat(session: &Session) -> Result<()> {
    let phone = read_line("Phone number: ")?;
    let chat = session
        .service
        .direct_chat_by_contact(&session.user, &phone)
        .await?;
    print_optional_chat(session, chat)
}

async fn contact_chats(session: &Session) -> Result<()> {
    let jid = read_line("Contact JID: ")?;
    let scope = read_scope()?;
    let page = read_page(Pagination::default())?;
    let chats = session
        .service
        .contact_chats(&session.user, scope, &jid, page)
        .await?;

    if session.output == Output::Json {
        return print_json(&chats);
    }

    if chats.is_empty() {
        println!("📭 No chats found");
    } else {
        println!("\n💬 Chats with {} ({}):", jid::format_jid_for_display(&jid), chats.len());
        for chat in &chats {
            print_chat(chat);
        }
    }
    Ok(())
}

async fn last_interaction(session: &Session) -> Result<()> {
    let jid = read_line("Contact or chat JID: ")?;
    let scope = read_scope()?;
    let message = session
        .service
        .last_interaction(&session.user, scope, &jid)
        .await?;

    if session.output == Output::Json {
        return print_json(&message);
    }

    match message {
        Some(msg) => print_message(session, &msg).await,
        None => println!("📭 No interaction found"),
    }
    Ok(())
}

async fn print_keyword_results(session: &Session, results: &KeywordResults) -> Result<()> {
    if session.output == Output::Json {
        return print_json(results);
    }

    println!("\n🔎 {} matches", results.total_matches);
    if let Some(counts) = &results.per_chat_counts {
        for (chat, count) in counts {
            println!("  {} {}", count, jid::format_jid_for_display(chat));
        }
    }

    match &results.page {
        KeywordPage::Matches(hits) => {
            for hit in hits {
                print!("[{}] ", hit.matched_keywords.join(", ").yellow());
                print_message(session, &hit.message).await;
            }
        }
        KeywordPage::WithContext(tagged) => {
            for item in tagged {
                print!("{} ", role_tag(item.role));
                print_message(session, &item.message).await;
            }
        }
    }
    Ok(())
}

async fn print_message(session: &Session, msg: &Message) {
    let sender = if msg.is_from_me {
        String::new()
    } else {
        let name = session
            .service
            .sender_display_name(&session.user, &msg.sender)
            .await;
        if name == msg.sender {
            jid::format_jid_for_display(&name)
        } else {
            name
        }
    };
    println!("{}", format_message(msg, &sender, true));
}

fn print_chat(chat: &Chat) {
    let name = chat
        .name
        .clone()
        .unwrap_or_else(|| jid::format_jid_for_display(&chat.jid));
    let icon = if chat.is_group() { "👥" } else { "👤" };
    let when = chat
        .last_message_time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    println!("  {} {} ({}) {}", icon, name.bold(), chat.jid.dimmed(), when);
    if let Some(last) = &chat.last_message {
        let from = if last.is_from_me == Some(true) {
            "Me".to_string()
        } else {
            last.sender_name
                .clone()
                .or_else(|| last.sender.as_deref().map(jid::format_jid_for_display))
                .unwrap_or_default()
        };
        let content = last
            .content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(last.media_type.as_deref())
            .unwrap_or("");
        println!("      └ {}: {}", from, content);
    }
}

fn print_optional_chat(session: &Session, chat: Option<Chat>) -> Result<()> {
    if session.output == Output::Json {
        return print_json(&chat);
    }

    match chat {
        Some(chat) => print_chat(&chat),
        None => println!("📭 Chat not found"),
    }
    Ok(())
}

fn role_tag(role: ContextRole) -> String {
    match role {
        ContextRole::Before => format!("{}", "before".dimmed()),
        ContextRole::Match => format!("{}", " match".bright_green().bold()),
        ContextRole::After => format!("{}", " after".dimmed()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_keyword_request(with_filters: bool) -> Result<KeywordRequest> {
    let keywords: Vec<String> = read_line("Keywords (comma separated): ")?
        .split(',')
        .map(String::from)
        .collect();
    let case_sensitive = read_yes_no("Case sensitive? [y/N]: ", false)?;

    let filter = if with_filters {
        MessageFilter {
            after: read_optional("After (ISO date, empty for none): ")?,
            before: read_optional("Before (ISO date, empty for none): ")?,
            chat_jid: read_optional("Chat JID or phone (empty for all): ")?,
            ..MessageFilter::default()
        }
    } else {
        MessageFilter::default()
    };

    Ok(KeywordRequest {
        keywords,
        filter,
        scope: read_scope()?,
        case_sensitive,
        context: read_context()?,
        page: read_page(Pagination::default())?,
    })
}

fn read_scope() -> Result<ChatScope> {
    Ok(if read_yes_no("Groups only? [Y/n]: ", true)? {
        ChatScope::AllowedGroups
    } else {
        ChatScope::Allowed
    })
}

fn read_page(default: Pagination) -> Result<Pagination> {
    let limit = read_number(&format!("Limit [{}]: ", default.limit), default.limit)?;
    let page = read_number("Page [0]: ", default.page)?;
    Ok(Pagination::new(limit, page))
}

fn read_context() -> Result<ContextPolicy> {
    if !read_yes_no("Include context? [Y/n]: ", true)? {
        return Ok(ContextPolicy::disabled());
    }
    let before = read_number("Messages before [1]: ", 1)?;
    let after = read_number("Messages after [1]: ", 1)?;
    Ok(ContextPolicy::around(before, after))
}

fn read_number(prompt: &str, default: u32) -> Result<u32> {
    match read_optional(prompt)? {
        Some(s) => s
            .parse()
            .wrap_err_with(|| format!("Not a number: {}", s)),
        None => Ok(default),
    }
}

fn read_yes_no(prompt: &str, default: bool) -> Result<bool> {
    Ok(match read_optional(prompt)? {
        Some(s) => matches!(s.to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "sim"),
        None => default,
    })
}

fn read_optional(prompt: &str) -> Result<Option<String>> {
    let input = read_line(prompt)?;
    Ok(if input.is_empty() { None } else { Some(input) })
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
