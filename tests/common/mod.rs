//! Shared test doubles: an in-memory store, a manual clock, a scripted
//! random source and a recording mailer.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;
use whiteboard_server::auth::{Clock, OsTokenRng, TokenRng};
use whiteboard_server::db::models::{ConfirmationToken, Post, Room, TokenRecord, User};
use whiteboard_server::db::{RoomStore, TokenStore, UserStore};
use whiteboard_server::email::Mailer;
use whiteboard_server::error::AppError;

type Result<T> = std::result::Result<T, AppError>;

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tokens: Vec<TokenRecord>,
    confirmations: Vec<ConfirmationToken>,
    rooms: Vec<Room>,
    members: Vec<(Uuid, Uuid)>,
    posts: Vec<Post>,
}

/// Vec-backed [`whiteboard_server::db::Store`]. Insertion order stands in
/// for the Postgres `seq` column when created_at ties.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_history_len(&self, user_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .count()
    }

    /// Plant a token record without going through issuance. Used to force
    /// collisions.
    pub fn seed_token(&self, login: &str, refresh: &str, created_at: DateTime<Utc>) -> Uuid {
        let user_id = Uuid::new_v4();
        self.inner.lock().unwrap().tokens.push(TokenRecord {
            id: Uuid::new_v4(),
            user_id,
            login_token: login.to_string(),
            refresh_token: refresh.to_string(),
            created_at,
        });
        user_id
    }

    pub fn confirmation_token_for(&self, email: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .confirmations
            .iter()
            .find(|c| c.user_email == email)
            .map(|c| c.confirmation_token.clone())
    }

    pub fn is_confirmed(&self, email: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.is_confirmed)
            .unwrap_or(false)
    }

    pub fn invite_password_for(&self, room_id: Uuid) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .map(|r| r.invite_password.clone())
    }

    fn most_recent(tokens: &[TokenRecord], matches: impl Fn(&TokenRecord) -> bool) -> Option<TokenRecord> {
        tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| matches(t))
            .max_by_key(|(i, t)| (t.created_at, *i))
            .map(|(_, t)| t.clone())
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn find_most_recent_by_login_token(&self, value: &str) -> Result<Option<TokenRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::most_recent(&inner.tokens, |t| t.login_token == value))
    }

    async fn find_most_recent_by_refresh_token(
        &self,
        value: &str,
    ) -> Result<Option<TokenRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::most_recent(&inner.tokens, |t| t.refresh_token == value))
    }

    async fn append_token(
        &self,
        user_id: Uuid,
        login_token: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<TokenRecord> {
        let record = TokenRecord {
            id: Uuid::new_v4(),
            user_id,
            login_token: login_token.to_string(),
            refresh_token: refresh_token.to_string(),
            created_at,
        };
        self.inner.lock().unwrap().tokens.push(record.clone());
        Ok(record)
    }

    async fn list_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<TokenRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        user: &User,
        login_token: &str,
        refresh_token: &str,
        confirmation_token: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User> {
        let mut inner = self.inner.lock().unwrap();
        inner.users.push(user.clone());
        inner.tokens.push(TokenRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            login_token: login_token.to_string(),
            refresh_token: refresh_token.to_string(),
            created_at,
        });
        inner.confirmations.push(ConfirmationToken {
            user_email: user.email.clone(),
            confirmation_token: confirmation_token.to_string(),
            created_at,
        });
        Ok(user.clone())
    }

    async fn find_confirmation_token_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ConfirmationToken>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .confirmations
            .iter()
            .find(|c| c.user_email == email)
            .cloned())
    }

    async fn complete_confirmation(&self, email: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.email == email) {
            user.is_confirmed = true;
        }
        inner.confirmations.retain(|c| c.user_email != email);
        Ok(())
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn create_room(
        &self,
        name: &str,
        invite_password: &str,
        author_id: Uuid,
    ) -> Result<Room> {
        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
            invite_password: invite_password.to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.members.push((room.id, author_id));
        inner.rooms.push(room.clone());
        Ok(room)
    }

    async fn find_room_by_id(&self, room_id: Uuid) -> Result<Option<Room>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned())
    }

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.members.contains(&(room_id, user_id)) {
            inner.members.push((room_id, user_id));
        }
        Ok(())
    }

    async fn is_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .members
            .contains(&(room_id, user_id)))
    }

    async fn create_post(&self, room_id: Uuid, author_id: Uuid, text: &str) -> Result<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            room_id,
            author_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().posts.push(post.clone());
        Ok(post)
    }

    async fn list_posts(&self, room_id: Uuid) -> Result<Vec<Post>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }
}

/// Movable time source.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Replays queued byte buffers, then an optional repeating buffer, then
/// falls back to OS entropy.
#[derive(Default)]
pub struct ScriptedRng {
    queue: Mutex<VecDeque<Vec<u8>>>,
    repeat: Option<Vec<u8>>,
}

impl ScriptedRng {
    pub fn new(draws: Vec<Vec<u8>>) -> Self {
        Self {
            queue: Mutex::new(draws.into()),
            repeat: None,
        }
    }

    /// Returns the same bytes on every draw. Never falls back.
    pub fn repeating(bytes: Vec<u8>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            repeat: Some(bytes),
        }
    }
}

impl TokenRng for ScriptedRng {
    fn fill(&self, buf: &mut [u8]) {
        let scripted = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone());

        match scripted {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                for b in &mut buf[n..] {
                    *b = 0;
                }
            }
            None => OsTokenRng.fill(buf),
        }
    }
}

/// Captures outbound confirmation mails.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_confirmation(&self, to: &str, confirmation_url: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), confirmation_url.to_string()));
        Ok(())
    }
}
