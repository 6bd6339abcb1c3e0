use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use natter_auth::{PasswordHasher, TokenService};
use natter_db::Database;
use natter_types::api::{AuthResponse, LoginRequest, RegisterRequest};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::{blocking, validate};

const USERNAME_TAKEN: &str = "username is already taken";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenService) -> AppState {
        Arc::new(Self {
            db,
            tokens,
            passwords: PasswordHasher::new(),
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate::username(&req.username)?;
    validate::password(&req.password)?;

    let st = state.clone();
    let user = blocking(move || {
        if st.db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
        }

        let password_hash = st.passwords.hash(&req.password)?;
        let display_name = req.display_name.as_deref().unwrap_or(&req.username);
        // A concurrent registration can take the name after the check above.
        st.db
            .create_user(&req.username, &password_hash, display_name)
            .map_err(|e| {
                if natter_db::is_unique_violation(&e) {
                    ApiError::Conflict(USERNAME_TAKEN.into())
                } else {
                    ApiError::Storage(e)
                }
            })
    })
    .await?;

    let (token, payload) = state.tokens.issue(user.id, &user.username)?;
    info!("Registered user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: convert::user_profile(user),
            token,
            expire_at: payload.expire_at,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    const BAD_CREDENTIALS: &str = "invalid username or password";

    let st = state.clone();
    let user = blocking(move || {
        let Some(user) = st.db.get_user_by_username(&req.username)? else {
            st.passwords.verify_dummy(&req.password);
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
        };
        if !st.passwords.verify(&user.password, &req.password) {
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
        }

        st.db.touch_last_seen(user.id)?;
        Ok(st.db.get_user_by_id(user.id)?.unwrap_or(user))
    })
    .await?;

    let (token, payload) = state.tokens.issue(user.id, &user.username)?;

    Ok(Json(AuthResponse {
        user: convert::user_profile(user),
        token,
        expire_at: payload.expire_at,
    }))
}
