//! Authorization gate.
//!
//! The predicates read current state from the database on every call; nothing
//! is cached. The `authorize_*` helpers are what handlers call: they load the
//! target first (absent → `NotFound`) and only then apply the predicate
//! (false → `Forbidden`).
//!
//! | Operation                              | Access                  |
//! |----------------------------------------|-------------------------|
//! | read chat, list messages, send message | `ChatAccess::Member`    |
//! | rename chat, add/remove member         | `ChatAccess::Admin`     |
//! | delete chat                            | `ChatAccess::Creator`   |
//! | read message                           | `MessageAccess::Read`   |
//! | edit/delete message                    | `MessageAccess::Sender` |
//! | update/delete profile                  | [`authorize_self`]      |

use anyhow::Result;

use natter_db::Database;
use natter_db::models::{ChatRow, MessageRow, UserRow};

use crate::error::{ApiError, ApiResult};

pub fn is_member(db: &Database, chat_id: i64, user_id: i64) -> Result<bool> {
    db.member_exists(chat_id, user_id)
}

/// No membership at all is `false`, not an error.
pub fn is_admin(db: &Database, chat_id: i64, user_id: i64) -> Result<bool> {
    Ok(db
        .get_member(chat_id, user_id)?
        .is_some_and(|member| member.is_admin))
}

pub fn is_creator(db: &Database, chat_id: i64, user_id: i64) -> Result<bool> {
    Ok(db
        .get_chat(chat_id)?
        .is_some_and(|chat| chat.creator_id == user_id))
}

pub fn is_sender(db: &Database, message_id: i64, user_id: i64) -> Result<bool> {
    Ok(db
        .get_message(message_id)?
        .is_some_and(|message| message.sender_id == user_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAccess {
    Member,
    Admin,
    Creator,
}

impl ChatAccess {
    fn denial(self) -> &'static str {
        match self {
            Self::Member => "you are not a member of this chat",
            Self::Admin => "only chat admins can do this",
            Self::Creator => "only the creator can delete the chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAccess {
    /// Caller is a member of the message's chat.
    Read,
    /// Caller sent the message.
    Sender,
}

pub fn authorize_chat(
    db: &Database,
    chat_id: i64,
    user_id: i64,
    access: ChatAccess,
) -> ApiResult<ChatRow> {
    let chat = db.get_chat(chat_id)?.ok_or(ApiError::NotFound("chat"))?;

    let allowed = match access {
        ChatAccess::Member => is_member(db, chat_id, user_id)?,
        ChatAccess::Admin => is_admin(db, chat_id, user_id)?,
        ChatAccess::Creator => is_creator(db, chat_id, user_id)?,
    };
    if !allowed {
        return Err(ApiError::Forbidden(access.denial()));
    }

    Ok(chat)
}

pub fn authorize_message(
    db: &Database,
    message_id: i64,
    user_id: i64,
    access: MessageAccess,
) -> ApiResult<MessageRow> {
    let message = db.get_message(message_id)?.ok_or(ApiError::NotFound("message"))?;

    match access {
        MessageAccess::Read => {
            if !is_member(db, message.chat_id, user_id)? {
                return Err(ApiError::Forbidden(ChatAccess::Member.denial()));
            }
        }
        MessageAccess::Sender => {
            if !is_sender(db, message_id, user_id)? {
                return Err(ApiError::Forbidden("you can only modify your own messages"));
            }
        }
    }

    Ok(message)
}

/// The caller may only act on their own profile.
pub fn authorize_self(db: &Database, caller_id: i64, target_id: i64) -> ApiResult<UserRow> {
    let user = db.get_user_by_id(target_id)?.ok_or(ApiError::NotFound("user"))?;
    if caller_id != target_id {
        return Err(ApiError::Forbidden("you can only modify your own profile"));
    }
    Ok(user)
}
