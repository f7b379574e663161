pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod rooms;

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::{OsTokenRng, SessionAuthority, TokenRng, UserAccount};
pub use db::{PgStore, Store};
pub use email::{Mailer, NoopMailer, SendgridMailer};

/// GET /health, outside the versioned prefix so load balancers can probe
/// it without credentials.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Liveness ping under the versioned API prefix.
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "pong" }))
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub authority: Arc<SessionAuthority>,
    pub mailer: Arc<dyn email::Mailer>,
    pub rng: Arc<dyn TokenRng>,
}

impl AppState {
    /// Production wiring: Postgres store, OS randomness, system clock,
    /// SendGrid when an API key is configured.
    pub async fn new(config: Settings) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(
            PgStore::new_with_options(
                &config.database.url,
                config.database.max_connections,
                Duration::from_secs(5),
            )
            .await?,
        );

        let authority = Arc::new(SessionAuthority::new(store.clone()));

        let mailer: Arc<dyn email::Mailer> = if config.email.api_key.is_empty() {
            Arc::new(NoopMailer)
        } else {
            Arc::new(SendgridMailer::new(&config.email))
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            authority,
            mailer,
            rng: Arc::new(OsTokenRng),
        })
    }

    /// Explicit wiring for tests and alternative deployments.
    pub fn with_parts(
        config: Settings,
        store: Arc<dyn Store>,
        authority: Arc<SessionAuthority>,
        mailer: Arc<dyn email::Mailer>,
        rng: Arc<dyn TokenRng>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            authority,
            mailer,
            rng,
        }
    }
}

/// Route table, shared between `main` and the route-level tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/v0")
            .route("/ping", web::get().to(ping))
            .route("/auth/register", web::post().to(auth::handlers::register))
            .route("/auth/refresh", web::post().to(auth::handlers::refresh))
            .route(
                "/auth/email-confirmation",
                web::get().to(auth::handlers::email_confirmation),
            )
            .route("/users/me", web::get().to(auth::handlers::me))
            .route("/rooms/create", web::post().to(rooms::handlers::create_room))
            .route(
                "/rooms/{room_id}/join",
                web::post().to(rooms::handlers::join_room),
            )
            .route(
                "/rooms/{room_id}/posts",
                web::post().to(rooms::handlers::create_post),
            )
            .route(
                "/rooms/{room_id}/posts",
                web::get().to(rooms::handlers::list_posts),
            ),
    );
}
