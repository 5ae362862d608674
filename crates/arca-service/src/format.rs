use arca_core::Message;

/// One-line rendering of a message for plain-text consumers:
///
/// `[2024-05-01 10:00:00] Chat: Team From: Ana: [image - Message ID: m1 - Chat JID: g1@g.us] hi`
///
/// The chat segment is omitted when `show_chat_info` is off or the chat has
/// no name. The bracketed media segment only appears for media messages.
pub fn format_message(message: &Message, sender_name: &str, show_chat_info: bool) -> String {
    let mut out = format!("[{}] ", message.timestamp.format("%Y-%m-%d %H:%M:%S"));

    if show_chat_info {
        if let Some(chat) = message.chat_name.as_deref().filter(|n| !n.is_empty()) {
            out.push_str(&format!("Chat: {} ", chat));
        }
    }

    let sender = if message.is_from_me { "Me" } else { sender_name };
    out.push_str(&format!("From: {}: ", sender));

    if let Some(media) = message.media_type.as_deref() {
        out.push_str(&format!(
            "[{} - Message ID: {} - Chat JID: {}] ",
            media, message.id, message.chat_jid
        ));
    }

    out.push_str(&message.content);
    out
}
