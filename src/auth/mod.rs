//! Token-based authentication and session lifecycle.
//!
//! Issuance of paired login/refresh tokens, their validity windows, the
//! collision-checked regeneration loop and the rotate-on-refresh protocol
//! live here. Persistence is behind the store traits in [`crate::db`].

pub mod account;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod token;

pub use account::UserAccount;
pub use session::{Clock, RotatedTokens, SessionAuthority, SystemClock};
pub use token::{OsTokenRng, TokenRng};
