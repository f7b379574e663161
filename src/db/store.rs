use crate::db::models::{ConfirmationToken, Post, Room, TokenRecord, User};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type Result<T> = std::result::Result<T, AppError>;

/// Persistence boundary for token history.
///
/// "Most recent" means greatest `created_at`, ties broken by insertion
/// order. Records are never updated or deleted; issuance only appends.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_most_recent_by_login_token(&self, value: &str) -> Result<Option<TokenRecord>>;

    async fn find_most_recent_by_refresh_token(&self, value: &str)
        -> Result<Option<TokenRecord>>;

    async fn append_token(
        &self,
        user_id: Uuid,
        login_token: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<TokenRecord>;

    async fn list_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<TokenRecord>>;
}

/// Persistence boundary for user identity and email confirmation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Create the user row together with its first token record and its
    /// confirmation token. Atomic where the backend allows it, so a user
    /// never exists tokenless.
    async fn create_user(
        &self,
        user: &User,
        login_token: &str,
        refresh_token: &str,
        confirmation_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User>;

    async fn find_confirmation_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ConfirmationToken>>;

    /// Flip `is_confirmed` and delete the confirmation token.
    async fn complete_confirmation(&self, email: &str) -> Result<()>;
}

/// Persistence boundary for rooms and posts.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, name: &str, invite_password: &str, author_id: Uuid)
        -> Result<Room>;

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>>;

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<()>;

    async fn is_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn create_post(&self, room_id: Uuid, author_id: Uuid, text: &str) -> Result<Post>;

    async fn list_posts(&self, room_id: Uuid) -> Result<Vec<Post>>;
}

/// Everything the application needs from persistence. Constructed once and
/// handed to components explicitly; there is no global store instance.
pub trait Store: TokenStore + UserStore + RoomStore {}

impl<T: TokenStore + UserStore + RoomStore> Store for T {}

/// Postgres-backed [`Store`].
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

const TOKEN_COLUMNS: &str = "id, user_id, login_token, refresh_token, created_at";
const USER_COLUMNS: &str =
    "id, email, username, hashed_password, is_confirmed, created_at, updated_at";

#[async_trait]
impl TokenStore for PgStore {
    async fn find_most_recent_by_login_token(&self, value: &str) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE login_token = $1 \
             ORDER BY created_at DESC, seq DESC LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn find_most_recent_by_refresh_token(
        &self,
        value: &str,
    ) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE refresh_token = $1 \
             ORDER BY created_at DESC, seq DESC LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn append_token(
        &self,
        user_id: Uuid,
        login_token: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<TokenRecord> {
        let record = sqlx::query_as::<_, TokenRecord>(&format!(
            "INSERT INTO tokens (id, user_id, login_token, refresh_token, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(login_token)
        .bind(refresh_token)
        .bind(created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn list_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<TokenRecord>> {
        let records = sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = $1 ORDER BY created_at, seq"
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create_user(
        &self,
        user: &User,
        login_token: &str,
        refresh_token: &str,
        confirmation_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User> {
        let mut transaction = self.pool.begin().await?;

        let result: std::result::Result<User, sqlx::Error> = async {
            let created = sqlx::query_as::<_, User>(&format!(
                "INSERT INTO users (id, email, username, hashed_password, is_confirmed, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
            ))
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.hashed_password)
            .bind(user.is_confirmed)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&mut *transaction)
            .await?;

            sqlx::query(
                "INSERT INTO tokens (id, user_id, login_token, refresh_token, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(login_token)
            .bind(refresh_token)
            .bind(created_at)
            .execute(&mut *transaction)
            .await?;

            sqlx::query(
                "INSERT INTO confirmation_tokens (user_email, confirmation_token, created_at) \
                 VALUES ($1, $2, $3)",
            )
            .bind(&created.email)
            .bind(confirmation_token)
            .bind(created_at)
            .execute(&mut *transaction)
            .await?;

            Ok(created)
        }
        .await;

        match result {
            Ok(created) => {
                transaction.commit().await?;
                Ok(created)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn find_confirmation_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ConfirmationToken>> {
        let token = sqlx::query_as::<_, ConfirmationToken>(
            "SELECT user_email, confirmation_token, created_at \
             FROM confirmation_tokens WHERE user_email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(token)
    }

    async fn complete_confirmation(&self, email: &str) -> Result<()> {
        let mut transaction = self.pool.begin().await?;

        let result: std::result::Result<(), sqlx::Error> = async {
            sqlx::query("UPDATE users SET is_confirmed = TRUE, updated_at = $1 WHERE email = $2")
                .bind(Utc::now())
                .bind(email)
                .execute(&mut *transaction)
                .await?;

            sqlx::query("DELETE FROM confirmation_tokens WHERE user_email = $1")
                .bind(email)
                .execute(&mut *transaction)
                .await?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                transaction.commit().await?;
                Ok(())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl RoomStore for PgStore {
    async fn create_room(
        &self,
        name: &str,
        invite_password: &str,
        author_id: Uuid,
    ) -> Result<Room> {
        let mut transaction = self.pool.begin().await?;

        let result: std::result::Result<Room, sqlx::Error> = async {
            let now = Utc::now();
            let room = sqlx::query_as::<_, Room>(
                "INSERT INTO rooms (id, name, invite_password, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, name, invite_password, created_at, updated_at",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(invite_password)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *transaction)
            .await?;

            sqlx::query("INSERT INTO room_members (room_id, user_id) VALUES ($1, $2)")
                .bind(room.id)
                .bind(author_id)
                .execute(&mut *transaction)
                .await?;

            Ok(room)
        }
        .await;

        match result {
            Ok(room) => {
                transaction.commit().await?;
                Ok(room)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, name, invite_password, created_at, updated_at FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(room)
    }

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO room_members (room_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(room_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn is_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.is_some())
    }

    async fn create_post(&self, room_id: Uuid, author_id: Uuid, text: &str) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (id, room_id, author_id, text, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, room_id, author_id, text, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(room_id)
        .bind(author_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(post)
    }

    async fn list_posts(&self, room_id: Uuid) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, room_id, author_id, text, created_at \
             FROM posts WHERE room_id = $1 ORDER BY created_at",
        )
        .bind(room_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(posts)
    }
}
