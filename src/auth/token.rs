use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Months, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Length of login and refresh token strings.
pub const TOKEN_LENGTH: usize = 48;

/// Random bytes drawn per candidate. 48 bytes encode to 64 base64 chars,
/// of which the first [`TOKEN_LENGTH`] are kept.
const TOKEN_SOURCE_BYTES: usize = 48;

/// Login tokens stay usable for 30 minutes after issuance.
pub const LOGIN_TOKEN_VALIDITY_MINUTES: i64 = 30;

/// Refresh tokens stay usable for 6 calendar months after issuance.
pub const REFRESH_TOKEN_VALIDITY_MONTHS: u32 = 6;

/// Email confirmation tokens: 48 random bytes, URL-safe base64 (64 chars).
pub const CONFIRMATION_TOKEN_LENGTH: usize = 64;

/// Email confirmation links stay usable for 1 day.
pub const CONFIRMATION_TOKEN_VALIDITY_DAYS: i64 = 1;

const INVITE_PASSWORD_LENGTH: usize = 32;
const INVITE_PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";

/// Source of cryptographically secure random bytes.
///
/// Production uses [`OsTokenRng`]; tests inject a scripted source to force
/// token collisions.
pub trait TokenRng: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

/// OS-entropy backed implementation.
pub struct OsTokenRng;

impl TokenRng for OsTokenRng {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Produce a 48-character candidate token: random bytes, base64-encoded,
/// truncated. The truncation means '=' padding never appears; the alphabet
/// is `[A-Za-z0-9+/]`.
pub fn generate_candidate(rng: &dyn TokenRng) -> String {
    let mut bytes = [0u8; TOKEN_SOURCE_BYTES];
    rng.fill(&mut bytes);
    let mut encoded = STANDARD.encode(bytes);
    encoded.truncate(TOKEN_LENGTH);
    encoded
}

/// Produce a 64-character email confirmation token.
pub fn generate_confirmation_token(rng: &dyn TokenRng) -> String {
    let mut bytes = [0u8; TOKEN_SOURCE_BYTES];
    rng.fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Produce a 32-character room invite password.
pub fn generate_invite_password(rng: &dyn TokenRng) -> String {
    let mut bytes = [0u8; INVITE_PASSWORD_LENGTH];
    rng.fill(&mut bytes);
    bytes
        .iter()
        .map(|b| INVITE_PASSWORD_CHARS[*b as usize % INVITE_PASSWORD_CHARS.len()] as char)
        .collect()
}

/// A login token issued at `issued_at` is valid strictly before this instant.
pub fn login_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at + Duration::minutes(LOGIN_TOKEN_VALIDITY_MINUTES)
}

/// A refresh token issued at `issued_at` is valid strictly before this
/// instant. Calendar-month arithmetic with end-of-month clamping, not a
/// fixed number of seconds.
pub fn refresh_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at
        .checked_add_months(Months::new(REFRESH_TOKEN_VALIDITY_MONTHS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Expiry instant for an email confirmation token.
pub fn confirmation_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at + Duration::days(CONFIRMATION_TOKEN_VALIDITY_DAYS)
}
