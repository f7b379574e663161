use crate::auth::middleware::{authenticate, extract_bearer_token};
use crate::auth::token::CONFIRMATION_TOKEN_LENGTH;
use crate::email;
use crate::error::{AppError, DatabaseError};
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub login_token: String,
    pub refresh_token: String,
    /// ISO-8601 creation timestamp of the pair.
    pub created_at: String,
}

/// POST /api/v0/auth/register
///
/// Creates the user, issues the initial token pair and sends the
/// confirmation mail. The username starts empty and is set by the client
/// later.
pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::ValidationError(
            "email and password are required".into(),
        ));
    }

    info!("Received registration request for email: {}", req.email);

    if state.store.find_user_by_email(&req.email).await?.is_some() {
        return Err(DatabaseError::Duplicate.into());
    }

    let account = state.authority.register(&req.email, &req.password, "").await?;

    // Confirmation mail delivery is best-effort; the account and tokens
    // already exist and the link can be re-requested operationally.
    match state
        .store
        .find_confirmation_token_by_email(&account.email)
        .await
    {
        Ok(Some(confirmation)) => {
            let url = email::confirmation_url(
                &state.config.email.confirmation_base_url,
                &account.email,
                &confirmation.confirmation_token,
            )?;
            if let Err(e) = state.mailer.send_confirmation(&account.email, &url).await {
                error!("Failed to send confirmation mail to {}: {}", account.email, e);
            }
        }
        Ok(None) => error!("No confirmation token stored for {}", account.email),
        Err(e) => error!("Failed to load confirmation token for {}: {}", account.email, e),
    }

    let current = account
        .current_token()
        .ok_or_else(|| AppError::InternalError("registration produced no token".into()))?;

    Ok(HttpResponse::Ok().json(TokenPairResponse {
        login_token: current.login_token.clone(),
        refresh_token: current.refresh_token.clone(),
        created_at: current.created_at.to_rfc3339(),
    }))
}

/// POST /api/v0/auth/refresh
///
/// Bearer credential is the current refresh token. Malformed shapes are a
/// 400; valid shapes that do not resolve are a 401.
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = extract_bearer_token(&req)?;

    let rotated = state.authority.rotate(token).await?;

    Ok(HttpResponse::Ok().json(TokenPairResponse {
        login_token: rotated.login_token,
        refresh_token: rotated.refresh_token,
        created_at: rotated.created_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationQuery {
    pub email: String,
    pub token: String,
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && value
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b' ')
}

fn is_well_formed_confirmation_token(value: &str) -> bool {
    value.len() == CONFIRMATION_TOKEN_LENGTH
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// GET /api/v0/auth/email-confirmation?email=..&token=..
///
/// Hit from a browser via the link in the confirmation mail, so the
/// success response is a small HTML page rather than JSON.
pub async fn email_confirmation(
    query: web::Query<ConfirmationQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !is_valid_email(&query.email) {
        return Err(AppError::ValidationError("invalid email".into()));
    }

    if !is_well_formed_confirmation_token(&query.token) {
        return Err(AppError::ValidationError("invalid confirmation token".into()));
    }

    match state
        .authority
        .confirm_email(&query.email, &query.token)
        .await?
    {
        Some(_) => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body("<h1>Registration complete</h1>")),
        None => Err(AppError::ValidationError("confirmation failed".into())),
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
}

/// GET /api/v0/users/me
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let account = authenticate(&req, &state.authority).await?;

    Ok(HttpResponse::Ok().json(MeResponse {
        id: account.id,
        username: account.username,
        email: account.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_syntax_check() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co.jp"));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn confirmation_token_shape_check() {
        let good = "A".repeat(CONFIRMATION_TOKEN_LENGTH);
        assert!(is_well_formed_confirmation_token(&good));
        assert!(!is_well_formed_confirmation_token(&good[..63]));
        let bad = format!("{}+", &good[..63]);
        assert!(!is_well_formed_confirmation_token(&bad));
    }
}
