//! Chat creation and member invitation.
//!
//! Creating a chat is three sequential writes, not one database transaction:
//!
//! 1. insert the chat;
//! 2. insert the creator's admin membership, deleting the chat again if this fails;
//! 3. invite the requested members one by one, skipping any that cannot be added.
//!
//! Steps 1 and 2 run inside one `Database::with_conn` call, so no other request
//! sees the chat before its creator is an admin member. Step 3 is best-effort
//! and its outcome is reported in [`MemberInvitation`].

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use natter_db::models::{ChatRow, MemberRow};
use natter_db::{Connection, Database, queries};
use natter_types::api::{InvitationReport, SkippedMemberResponse};

#[derive(Debug, Error)]
pub enum CreationError {
    #[error("failed to create chat: {cause}")]
    ChatInsert { cause: anyhow::Error },

    #[error("failed to add creator to chat {chat_id}, chat rolled back: {cause}")]
    CreatorJoin { chat_id: i64, cause: anyhow::Error },

    /// The rollback delete failed too; the chat row exists with no members.
    #[error(
        "failed to add creator to chat {chat_id} ({cause}) and rollback failed ({rollback}); chat is orphaned"
    )]
    Orphaned {
        chat_id: i64,
        cause: anyhow::Error,
        rollback: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Creator,
    Duplicate,
    AlreadyMember,
    UnknownUser,
    StorageFailure,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Duplicate => "duplicate",
            Self::AlreadyMember => "already_member",
            Self::UnknownUser => "unknown_user",
            Self::StorageFailure => "storage_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedMember {
    pub user_id: i64,
    pub reason: SkipReason,
}

/// Which requested members were attached, and why the rest were not.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MemberInvitation {
    pub added: Vec<i64>,
    pub skipped: Vec<SkippedMember>,
}

impl MemberInvitation {
    fn skip(&mut self, user_id: i64, reason: SkipReason) {
        self.skipped.push(SkippedMember { user_id, reason });
    }

    pub fn report(&self) -> InvitationReport {
        InvitationReport {
            added: self.added.clone(),
            skipped: self
                .skipped
                .iter()
                .map(|s| SkippedMemberResponse {
                    user_id: s.user_id,
                    reason: s.reason.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// A chat that exists with its creator attached as admin.
#[derive(Debug)]
pub struct ChatCreated {
    pub chat: ChatRow,
    pub creator_membership: MemberRow,
    pub invitation: MemberInvitation,
}

pub fn create_chat_with_members(
    db: &Database,
    name: &str,
    is_group: bool,
    creator_id: i64,
    member_ids: &[i64],
) -> Result<ChatCreated, CreationError> {
    let (chat, creator_membership) = db
        .with_conn(|conn| Ok(found_chat(conn, name, is_group, creator_id)))
        .map_err(|cause| CreationError::ChatInsert { cause })??;

    let invitation = invite_members(db, chat.id, creator_id, member_ids);

    info!(
        "Chat {} created by user {} ({} of {} requested members added)",
        chat.id,
        creator_id,
        invitation.added.len(),
        member_ids.len()
    );

    Ok(ChatCreated {
        chat,
        creator_membership,
        invitation,
    })
}

/// Steps 1 and 2, on a connection the caller holds exclusively.
fn found_chat(
    conn: &Connection,
    name: &str,
    is_group: bool,
    creator_id: i64,
) -> Result<(ChatRow, MemberRow), CreationError> {
    let chat = queries::insert_chat(conn, name, is_group, creator_id)
        .map_err(|cause| CreationError::ChatInsert { cause })?;

    match queries::insert_member(conn, chat.id, creator_id, true) {
        Ok(membership) => Ok((chat, membership)),
        Err(cause) => Err(roll_back(conn, chat.id, cause)),
    }
}

fn roll_back(conn: &Connection, chat_id: i64, cause: anyhow::Error) -> CreationError {
    match queries::remove_chat(conn, chat_id) {
        Ok(_) => {
            warn!("Creator join failed for chat {}, chat deleted: {}", chat_id, cause);
            CreationError::CreatorJoin { chat_id, cause }
        }
        Err(rollback) => {
            error!(
                "ORPHANED CHAT {}: creator join failed ({}) and rollback delete failed ({})",
                chat_id, cause, rollback
            );
            CreationError::Orphaned {
                chat_id,
                cause,
                rollback,
            }
        }
    }
}

/// Attach each requested user to the chat as a non-admin member.
///
/// Duplicates, the creator, existing members and unknown users are skipped.
/// A storage failure for one member skips that member only.
pub fn invite_members(
    db: &Database,
    chat_id: i64,
    creator_id: i64,
    member_ids: &[i64],
) -> MemberInvitation {
    let mut invitation = MemberInvitation::default();
    let mut seen = HashSet::with_capacity(member_ids.len());

    for &user_id in member_ids {
        if !seen.insert(user_id) {
            invitation.skip(user_id, SkipReason::Duplicate);
            continue;
        }
        if user_id == creator_id {
            invitation.skip(user_id, SkipReason::Creator);
            continue;
        }

        match classify(db, chat_id, user_id) {
            Ok(None) => {}
            Ok(Some(reason)) => {
                debug!("Skipping user {} for chat {}: {}", user_id, chat_id, reason.as_str());
                invitation.skip(user_id, reason);
                continue;
            }
            Err(e) => {
                warn!("Lookup for user {} in chat {} failed: {}", user_id, chat_id, e);
                invitation.skip(user_id, SkipReason::StorageFailure);
                continue;
            }
        }

        match db.add_member(chat_id, user_id, false) {
            Ok(_) => invitation.added.push(user_id),
            Err(e) => {
                warn!("Failed to add user {} to chat {}: {}", user_id, chat_id, e);
                invitation.skip(user_id, SkipReason::StorageFailure);
            }
        }
    }

    invitation
}

fn classify(db: &Database, chat_id: i64, user_id: i64) -> anyhow::Result<Option<SkipReason>> {
    if db.member_exists(chat_id, user_id)? {
        return Ok(Some(SkipReason::AlreadyMember));
    }
    if !db.user_exists(user_id)? {
        return Ok(Some(SkipReason::UnknownUser));
    }
    Ok(None)
}
