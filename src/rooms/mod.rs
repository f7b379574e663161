//! Room and post endpoints. Rooms are joined with a server-generated
//! invite password; posts are scoped to a room and member-only.

pub mod handlers;
