use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use natter_types::api::{
    AddMembersRequest, ChatDetail, CreateChatRequest, CreateChatResponse, InvitationReport,
    TokenPayload, UpdateChatRequest,
};
use natter_types::models::Chat;

use crate::auth::AppState;
use crate::creation::{create_chat_with_members, invite_members};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::gate::{self, ChatAccess};
use crate::{Page, blocking, convert, validate};

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<CreateChatRequest>,
) -> ApiResult<impl IntoResponse> {
    validate::chat_name(&req.name)?;
    if req.member_ids.is_empty() {
        return Err(ApiError::Validation("at least one member is required".into()));
    }

    let created = blocking(move || {
        Ok(create_chat_with_members(
            &state.db,
            req.name.trim(),
            req.is_group,
            caller.user_id,
            &req.member_ids,
        )?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            invitation: created.invitation.report(),
            chat: convert::chat(created.chat),
        }),
    ))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(caller): Extension<TokenPayload>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Chat>>> {
    let rows = blocking(move || {
        Ok(state
            .db
            .list_chats_for_user(caller.user_id, page.limit(), page.offset)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(convert::chat).collect()))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<Json<ChatDetail>> {
    let (chat, members) = blocking(move || {
        let chat = gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Member)?;
        let members = state.db.list_members(chat_id)?;
        Ok((chat, members))
    })
    .await?;

    Ok(Json(ChatDetail {
        chat: convert::chat(chat),
        members: members.into_iter().map(convert::member).collect(),
    }))
}

pub async fn update_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<UpdateChatRequest>,
) -> ApiResult<Json<Chat>> {
    let chat = blocking(move || {
        gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Admin)?;
        validate::chat_name(&req.name)?;
        state
            .db
            .rename_chat(chat_id, req.name.trim())?
            .ok_or(ApiError::NotFound("chat"))
    })
    .await?;
    Ok(Json(convert::chat(chat)))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Creator)?;
        if !state.db.delete_chat(chat_id)? {
            return Err(ApiError::NotFound("chat"));
        }
        Ok(())
    })
    .await?;

    info!("Chat {} deleted by its creator", chat_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_members(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<AddMembersRequest>,
) -> ApiResult<Json<InvitationReport>> {
    let invitation = blocking(move || {
        let chat = gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Admin)?;
        if req.member_ids.is_empty() {
            return Err(ApiError::Validation("at least one member is required".into()));
        }
        Ok(invite_members(&state.db, chat_id, chat.creator_id, &req.member_ids))
    })
    .await?;
    Ok(Json(invitation.report()))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(i64, i64)>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        let chat = gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Admin)?;
        if !state.db.member_exists(chat_id, user_id)? {
            return Err(ApiError::NotFound("member"));
        }
        // The creator keeps their admin membership for the life of the chat.
        if user_id == chat.creator_id {
            return Err(ApiError::Forbidden("the chat creator cannot be removed"));
        }
        state.db.remove_member(chat_id, user_id)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
