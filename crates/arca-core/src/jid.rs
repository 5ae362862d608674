/// Utilities for parsing and formatting WhatsApp JIDs
pub const USER_SUFFIX: &str = "@s.whatsapp.net";
pub const GROUP_SUFFIX: &str = "@g.us";

/// Group chats are the ones whose JID ends with `@g.us`
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Resolve a loosely typed chat identifier to a full JID.
/// A bare identifier (usually a phone number) is taken to be a direct chat.
pub fn normalize_chat_jid(jid: &str) -> String {
    let jid = jid.trim();
    if jid.ends_with(USER_SUFFIX) || jid.ends_with(GROUP_SUFFIX) {
        jid.to_string()
    } else {
        format!("{}{}", jid, USER_SUFFIX)
    }
}

/// The part of the JID before the first `@`
pub fn phone_part(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// Format a JID for display
/// - If it's a phone number JID (e.g., "5511999999999@s.whatsapp.net"), format the phone number
/// - If it only has LID, show "(LID)"
/// - Otherwise, show the raw JID
pub fn format_jid_for_display(jid: &str) -> String {
    // Direct chats keyed by phone number
    if jid.ends_with(USER_SUFFIX) {
        let phone = phone_part(jid);
        if !phone.is_empty() && phone.chars().all(|c| c.is_ascii_digit()) {
            return format_phone_number(phone);
        }
    }

    // Groups are shown by name elsewhere
    if is_group(jid) {
        return jid.to_string();
    }

    // Bare LID, no server part
    if jid.starts_with("2:") || (!jid.contains('@') && jid.contains(':')) {
        return "(LID)".to_string();
    }

    // User LID
    if jid.contains("@lid") {
        return "(U)".to_string();
    }

    // Unknown shape: show as-is
    jid.to_string()
}

/// Format a phone number string for better readability
/// Example: "5511999999999" -> "+55 11 99999-9999"
pub fn format_phone_number(phone: &str) -> String {
    if phone.is_empty() {
        return phone.to_string();
    }

    // Brazilian numbers: +55 AA NNNNN-NNNN or +55 AA NNNN-NNNN
    if phone.starts_with("55") && phone.len() >= 12 {
        let country = &phone[0..2];
        let area = &phone[2..4];
        let rest = &phone[4..];

        if rest.len() == 9 {
            // Mobile
            return format!("+{} {} {}-{}", country, area, &rest[0..5], &rest[5..]);
        } else if rest.len() == 8 {
            // Landline
            return format!("+{} {} {}-{}", country, area, &rest[0..4], &rest[4..]);
        }
    }

    // Long enough to be international, only prefix it
    if phone.len() > 10 {
        return format!("+{}", phone);
    }

    phone.to_string()
}
