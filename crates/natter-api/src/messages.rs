use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use natter_types::api::{SendMessageRequest, TokenPayload, UpdateMessageRequest};
use natter_types::models::Message;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::gate::{self, ChatAccess, MessageAccess};
use crate::{Page, blocking, convert, validate};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let row = blocking(move || {
        gate::authorize_chat(&state.db, req.chat_id, caller.user_id, ChatAccess::Member)?;
        validate::message_content(&req.content)?;
        Ok(state.db.create_message(req.chat_id, caller.user_id, &req.content)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::message(row))))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<Json<Message>> {
    let row = blocking(move || {
        gate::authorize_message(&state.db, message_id, caller.user_id, MessageAccess::Read)
    })
    .await?;
    Ok(Json(convert::message(row)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(page): Query<Page>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<Json<Vec<Message>>> {
    let rows = blocking(move || {
        gate::authorize_chat(&state.db, chat_id, caller.user_id, ChatAccess::Member)?;
        Ok(state.db.list_messages(chat_id, page.limit(), page.offset)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(convert::message).collect()))
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<UpdateMessageRequest>,
) -> ApiResult<Json<Message>> {
    let row = blocking(move || {
        gate::authorize_message(&state.db, message_id, caller.user_id, MessageAccess::Sender)?;
        validate::message_content(&req.content)?;
        state
            .db
            .update_message(message_id, &req.content)?
            .ok_or(ApiError::NotFound("message"))
    })
    .await?;
    Ok(Json(convert::message(row)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        gate::authorize_message(&state.db, message_id, caller.user_id, MessageAccess::Sender)?;
        if !state.db.delete_message(message_id)? {
            return Err(ApiError::NotFound("message"));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
