//! Row-to-model conversion for responses.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use natter_db::models::{ChatRow, MemberRow, MessageRow, UserRow};
use natter_types::models::{Chat, ChatMember, Message, UserProfile};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without a timezone;
/// they are always UTC.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        created_at: parse_timestamp(&row.created_at),
        last_seen: row.last_seen.as_deref().map(parse_timestamp),
    }
}

pub(crate) fn chat(row: ChatRow) -> Chat {
    Chat {
        id: row.id,
        name: row.name,
        is_group: row.is_group,
        creator_id: row.creator_id,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub(crate) fn member(row: MemberRow) -> ChatMember {
    ChatMember {
        user_id: row.user_id,
        username: row.username,
        is_admin: row.is_admin,
        joined_at: parse_timestamp(&row.joined_at),
    }
}

pub(crate) fn message(row: MessageRow) -> Message {
    Message {
        id: row.id,
        chat_id: row.chat_id,
        sender_id: row.sender_id,
        content: row.content,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(parse_timestamp("2026-03-01 12:30:05"), expected);
        assert_eq!(parse_timestamp("2026-03-01T12:30:05Z"), expected);
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
