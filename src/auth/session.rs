use crate::auth::account::UserAccount;
use crate::auth::token::{self, OsTokenRng, TokenRng};
use crate::db::models::{TokenRecord, User};
use crate::db::store::Store;
use crate::error::{AppError, AuthError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

type Result<T> = std::result::Result<T, AppError>;

/// Time source, injectable so tests can move the clock past validity
/// windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A 48-character candidate collides with probability ~2^-286 per active
/// token, so the retry loop terminates almost surely on the first pass.
/// The cap exists to turn a broken random source into a typed error
/// instead of a spin.
const MAX_ISSUE_ATTEMPTS: usize = 64;

/// Work factor for password hashes.
const BCRYPT_COST: u32 = 10;

#[derive(Clone, Copy)]
enum TokenKind {
    Login,
    Refresh,
}

impl TokenKind {
    fn expiry(self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TokenKind::Login => token::login_expiry(issued_at),
            TokenKind::Refresh => token::refresh_expiry(issued_at),
        }
    }
}

/// Result of a successful refresh rotation.
#[derive(Debug, Serialize)]
pub struct RotatedTokens {
    pub login_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

/// Orchestrates collision-checked token issuance, validity evaluation and
/// the rotate-on-refresh protocol over an injected store.
pub struct SessionAuthority {
    store: Arc<dyn Store>,
    rng: Arc<dyn TokenRng>,
    clock: Arc<dyn Clock>,
}

impl SessionAuthority {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_parts(store, Arc::new(OsTokenRng), Arc::new(SystemClock))
    }

    pub fn with_parts(
        store: Arc<dyn Store>,
        rng: Arc<dyn TokenRng>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, rng, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Issue a login token that no *currently valid* login token equals.
    /// A collision with an expired record is tolerated and the string is
    /// reused.
    pub async fn issue_login_token(&self) -> Result<String> {
        self.issue(TokenKind::Login, None).await
    }

    /// Refresh-token counterpart of [`issue_login_token`], checked against
    /// the 6-month window.
    ///
    /// [`issue_login_token`]: Self::issue_login_token
    pub async fn issue_refresh_token(&self) -> Result<String> {
        self.issue(TokenKind::Refresh, None).await
    }

    async fn issue(&self, kind: TokenKind, exclude: Option<&str>) -> Result<String> {
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let candidate = token::generate_candidate(self.rng.as_ref());

            // A rotation must never hand back the exact string it is
            // replacing, even if that string's record has already expired.
            if exclude == Some(candidate.as_str()) {
                debug!("candidate equals the token being replaced, regenerating");
                continue;
            }

            let existing = match kind {
                TokenKind::Login => {
                    self.store.find_most_recent_by_login_token(&candidate).await?
                }
                TokenKind::Refresh => {
                    self.store
                        .find_most_recent_by_refresh_token(&candidate)
                        .await?
                }
            };

            let collides_with_active = existing
                .map(|record| self.clock.now() < kind.expiry(record.created_at))
                .unwrap_or(false);

            if collides_with_active {
                debug!("candidate collides with an active token, regenerating");
                continue;
            }

            return Ok(candidate);
        }

        error!(
            attempts = MAX_ISSUE_ATTEMPTS,
            "token issuance exhausted its retry budget"
        );
        Err(AuthError::IssuanceExhausted.into())
    }

    /// Resolve a login token to its owner. Unknown and expired tokens are
    /// both reported as [`AuthError::UnresolvedCredential`]; the boundary
    /// at exactly +30 minutes counts as expired.
    pub async fn resolve_by_login_token(&self, value: &str) -> Result<UserAccount> {
        let record = self
            .store
            .find_most_recent_by_login_token(value)
            .await?
            .filter(|r| self.clock.now() < token::login_expiry(r.created_at))
            .ok_or(AuthError::UnresolvedCredential)?;

        self.hydrate_owner(&record).await
    }

    /// Same shape as [`resolve_by_login_token`] with the 6-month window.
    ///
    /// [`resolve_by_login_token`]: Self::resolve_by_login_token
    pub async fn resolve_by_refresh_token(&self, value: &str) -> Result<UserAccount> {
        let record = self
            .store
            .find_most_recent_by_refresh_token(value)
            .await?
            .filter(|r| self.clock.now() < token::refresh_expiry(r.created_at))
            .ok_or(AuthError::UnresolvedCredential)?;

        self.hydrate_owner(&record).await
    }

    /// Exchange a currently valid refresh token for a brand-new pair.
    ///
    /// Appends one token record; the superseded record is kept as history
    /// and is not revoked. Two concurrent rotations of the same refresh
    /// token can therefore both succeed; the store's insertion order
    /// decides which pair ends up current.
    pub async fn rotate(&self, refresh_token: &str) -> Result<RotatedTokens> {
        let record = self
            .store
            .find_most_recent_by_refresh_token(refresh_token)
            .await?
            .filter(|r| self.clock.now() < token::refresh_expiry(r.created_at))
            .ok_or(AuthError::UnresolvedCredential)?;

        let new_login = self
            .issue(TokenKind::Login, Some(&record.login_token))
            .await?;
        let new_refresh = self
            .issue(TokenKind::Refresh, Some(&record.refresh_token))
            .await?;

        let appended = self
            .store
            .append_token(record.user_id, &new_login, &new_refresh, self.clock.now())
            .await?;

        info!(user_id = %record.user_id, "rotated session tokens");

        Ok(RotatedTokens {
            login_token: appended.login_token,
            refresh_token: appended.refresh_token,
            created_at: appended.created_at,
        })
    }

    /// Create a user together with their first token pair and an email
    /// confirmation token. The store makes the three writes atomic.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<UserAccount> {
        let hashed_password = bcrypt::hash(password, BCRYPT_COST)?;

        let login_token = self.issue_login_token().await?;
        let refresh_token = self.issue_refresh_token().await?;
        let confirmation_token = token::generate_confirmation_token(self.rng.as_ref());

        let now = self.clock.now();
        let mut user = User::new(email.to_string(), username.to_string(), hashed_password);
        user.created_at = now;
        user.updated_at = now;

        let created = self
            .store
            .create_user(&user, &login_token, &refresh_token, &confirmation_token, now)
            .await?;

        info!(user_id = %created.id, "registered user");

        let tokens = self.store.list_tokens_for_user(created.id).await?;
        Ok(UserAccount::hydrate(created, tokens))
    }

    /// Compare the stored confirmation token for `email` against `value`
    /// and, inside the 1-day window, mark the user confirmed. Returns
    /// `None` for any mismatch so callers cannot tell which check failed.
    pub async fn confirm_email(&self, email: &str, value: &str) -> Result<Option<UserAccount>> {
        let Some(stored) = self.store.find_confirmation_token_by_email(email).await? else {
            return Ok(None);
        };

        if stored.confirmation_token != value {
            return Ok(None);
        }

        if self.clock.now() > token::confirmation_expiry(stored.created_at) {
            return Ok(None);
        }

        self.store.complete_confirmation(email).await?;
        info!(email, "email confirmed");

        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Ok(None);
        };
        let tokens = self.store.list_tokens_for_user(user.id).await?;
        Ok(Some(UserAccount::hydrate(user, tokens)))
    }

    /// Hydrate the account owning `record`, including its full token
    /// history.
    async fn hydrate_owner(&self, record: &TokenRecord) -> Result<UserAccount> {
        let user = self
            .store
            .find_user_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UnresolvedCredential)?;

        let tokens = self.store.list_tokens_for_user(user.id).await?;
        Ok(UserAccount::hydrate(user, tokens))
    }

    pub async fn find_account_by_id(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let Some(user) = self.store.find_user_by_id(id).await? else {
            return Ok(None);
        };
        let tokens = self.store.list_tokens_for_user(user.id).await?;
        Ok(Some(UserAccount::hydrate(user, tokens)))
    }
}
