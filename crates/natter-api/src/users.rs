use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use natter_types::api::{LastSeenResponse, TokenPayload, UpdateUserRequest};
use natter_types::models::UserProfile;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::{Page, blocking, convert, gate, validate};

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let rows = blocking(move || Ok(state.db.list_users(page.limit(), page.offset)?)).await?;
    Ok(Json(rows.into_iter().map(convert::user_profile).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let row = blocking(move || {
        state
            .db
            .get_user_by_id(user_id)?
            .ok_or(ApiError::NotFound("user"))
    })
    .await?;
    Ok(Json(convert::user_profile(row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    let row = blocking(move || {
        gate::authorize_self(&state.db, caller.user_id, user_id)?;

        if let Some(password) = &req.password {
            validate::password(password)?;
        }
        let password_hash = req
            .password
            .as_deref()
            .map(|p| state.passwords.hash(p))
            .transpose()?;

        state
            .db
            .update_user(user_id, req.display_name.as_deref(), password_hash.as_deref())?
            .ok_or(ApiError::NotFound("user"))
    })
    .await?;
    Ok(Json(convert::user_profile(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        gate::authorize_self(&state.db, caller.user_id, user_id)?;
        if !state.db.delete_user(user_id)? {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    })
    .await?;

    info!("User {} deleted their account", user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn touch_last_seen(
    State(state): State<AppState>,
    Extension(caller): Extension<TokenPayload>,
) -> ApiResult<Json<LastSeenResponse>> {
    let last_seen = blocking(move || {
        state
            .db
            .touch_last_seen(caller.user_id)?
            .ok_or(ApiError::NotFound("user"))
    })
    .await?;

    Ok(Json(LastSeenResponse {
        last_seen: convert::parse_timestamp(&last_seen),
    }))
}
