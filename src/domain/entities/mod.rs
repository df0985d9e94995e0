//! # Domain Entities
//!
//! The records the realtime layer reads from and writes to the platform
//! database.
//!
//! - **User**: account identity plus the presence columns
//! - **Group**: a group or broadcast channel with its admin and members
//! - **Message**: a stored chat message, addressed to a user or a group
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure layer.

mod group;
mod message;
mod user;

pub use group::{Group, GroupKind, GroupRepository};
pub use message::{Message, MessageRepository, MessageType, NewMessage, Recipient};
pub use user::{User, UserRepository};

#[cfg(test)]
pub use group::MockGroupRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use user::MockUserRepository;
