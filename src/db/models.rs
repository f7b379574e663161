use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, username: String, hashed_password: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            hashed_password,
            is_confirmed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One issued login/refresh pair. Records are append-only history; the pair
/// with the greatest `created_at` is the user's current one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub login_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

/// Single-use email confirmation token, deleted once the user confirms.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfirmationToken {
    pub user_email: String,
    pub confirmation_token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub invite_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
