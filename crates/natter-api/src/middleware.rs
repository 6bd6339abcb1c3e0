use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use natter_auth::AuthError;

use crate::auth::AppState;
use crate::error::ApiError;

/// Verify the bearer token and attach its `TokenPayload` to the request.
///
/// A missing header, a non-bearer scheme and an unverifiable token are all 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidToken)?;

    let payload = state.tokens.verify(token.trim()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        e
    })?;

    req.extensions_mut().insert(payload);
    Ok(next.run(req).await)
}
