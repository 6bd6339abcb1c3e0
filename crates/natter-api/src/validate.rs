//! Input checks. Only shape is validated here; permissions live in `gate`.

use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_MESSAGE_LEN: usize = 4096;
const MAX_CHAT_NAME_LEN: usize = 100;

pub fn username(name: &str) -> ApiResult<()> {
    let len = name.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::Validation("username must be 3 to 32 characters".into()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ApiError::Validation("username must not contain whitespace".into()));
    }
    Ok(())
}

pub fn password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn chat_name(name: &str) -> ApiResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_CHAT_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "chat name must be 1 to {} characters",
            MAX_CHAT_NAME_LEN
        )));
    }
    Ok(())
}

pub fn message_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() || content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation(format!(
            "message must be 1 to {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(())
}
