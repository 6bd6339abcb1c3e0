use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Chat, ChatMember, UserProfile};

// -- Session tokens --

/// Identity claims carried inside an encrypted session token. Shared by
/// natter-auth (which seals and opens tokens) and natter-api (which uses the
/// verified payload as the caller's identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user_id: i64,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
    pub expire_at: DateTime<Utc>,
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LastSeenResponse {
    pub last_seen: DateTime<Utc>,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChatRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMembersRequest {
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub members: Vec<ChatMember>,
}

/// Outcome of a member invitation: who was attached and who was passed over.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationReport {
    pub added: Vec<i64>,
    pub skipped: Vec<SkippedMemberResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkippedMemberResponse {
    pub user_id: i64,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChatResponse {
    #[serde(flatten)]
    pub chat: Chat,
    pub invitation: InvitationReport,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub content: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
