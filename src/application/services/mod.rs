//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **IdentityResolver**: bearer credential to user id
//! - **PresenceDirectory**: online flag and last-seen per user
//! - **ChatService**: direct and group message storage

pub mod auth_service;
pub mod chat_service;
pub mod presence_service;

pub use auth_service::{AuthError, Claims, IdentityResolver, JwtIdentityResolver};
pub use chat_service::{ChatError, ChatService};
pub use presence_service::PresenceDirectory;

#[cfg(test)]
pub use auth_service::MockIdentityResolver;
