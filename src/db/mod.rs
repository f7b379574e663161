//! Persistence layer: row models and the store traits with their
//! Postgres implementation.

pub mod models;
pub mod store;

pub use models::{ConfirmationToken, Post, Room, TokenRecord, User};
pub use store::{PgStore, RoomStore, Store, TokenStore, UserStore};
