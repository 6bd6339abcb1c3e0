//! Database row types. These map directly to SQLite rows and stay
//! independent of the natter-types API models.
//!
//! Timestamps are SQLite `datetime('now')` text: `YYYY-MM-DD HH:MM:SS`, UTC.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub created_at: String,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: i64,
    pub name: String,
    pub is_group: bool,
    pub creator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub joined_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}
