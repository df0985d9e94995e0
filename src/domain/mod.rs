//! # Domain Layer
//!
//! The domain layer contains the records and rules of the chat subsystem.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Users, groups and messages with their repository traits
//! - **services**: Domain services for rules spanning entities
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
