use crate::auth::token;
use crate::db::models::{TokenRecord, User};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A user hydrated with their full token history.
///
/// The current token is the record with the greatest `created_at`
/// (insertion order breaks ties) and is computed once at hydration.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    tokens: Vec<TokenRecord>,
    current_token: Option<TokenRecord>,
}

impl UserAccount {
    /// `tokens` must be ordered oldest-first, as the store returns them.
    pub fn hydrate(user: User, tokens: Vec<TokenRecord>) -> Self {
        let current_token = tokens
            .iter()
            .cloned()
            .reduce(|a, b| if b.created_at >= a.created_at { b } else { a });

        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            hashed_password: user.hashed_password,
            is_confirmed: user.is_confirmed,
            created_at: user.created_at,
            tokens,
            current_token,
        }
    }

    /// None only if the user somehow has zero token records, which should
    /// not occur post-registration.
    pub fn current_token(&self) -> Option<&TokenRecord> {
        self.current_token.as_ref()
    }

    pub fn tokens(&self) -> &[TokenRecord] {
        &self.tokens
    }

    /// Whether the current pair's login token is inside its 30-minute
    /// window. The boundary is exclusive: at exactly +30 minutes the token
    /// is expired.
    pub fn is_login_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.current_token
            .as_ref()
            .map(|t| now < token::login_expiry(t.created_at))
            .unwrap_or(false)
    }

    /// Whether the current pair's refresh token is inside its 6-month
    /// window.
    pub fn is_refresh_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.current_token
            .as_ref()
            .map(|t| now < token::refresh_expiry(t.created_at))
            .unwrap_or(false)
    }
}
