use crate::auth::account::UserAccount;
use crate::auth::session::SessionAuthority;
use crate::auth::token::TOKEN_LENGTH;
use crate::error::{AppError, AuthError};
use actix_web::HttpRequest;

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'~' | b'+' | b'/' | b'-')
}

/// Bearer credential contract: exactly 48 characters of
/// `[A-Za-z0-9_~+/-]`. Anything else is rejected before the session
/// authority is consulted.
pub fn is_well_formed_token(value: &str) -> bool {
    value.len() == TOKEN_LENGTH && value.bytes().all(is_token_char)
}

/// Pull the bearer credential out of the `Authorization` header and check
/// its shape. Shape failures are a 400-class outcome.
pub fn extract_bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MalformedCredential)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedCredential)?;

    if !is_well_formed_token(token) {
        return Err(AuthError::MalformedCredential.into());
    }

    Ok(token)
}

/// Resolve the request's bearer login token to its owning account.
/// Well-formed but unknown or expired tokens surface uniformly as a
/// 401-class outcome.
pub async fn authenticate(
    req: &HttpRequest,
    authority: &SessionAuthority,
) -> Result<UserAccount, AppError> {
    let token = extract_bearer_token(req)?;
    authority.resolve_by_login_token(token).await
}
