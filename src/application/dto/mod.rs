//! Data Transfer Objects
//!
//! Serializable views pushed to clients over the chat connections.

pub mod message;

pub use message::{GroupView, MessageView, UserView};
