//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgUserRepository** - identity lookups and presence writes
//! - **PgGroupRepository** - groups with admin and members loaded
//! - **PgMessageRepository** - message inserts and chat list upkeep
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use honey_realtime::infrastructure::repositories::{
//!     PgGroupRepository, PgMessageRepository, PgUserRepository,
//! };
//!
//! fn setup_repositories(pool: PgPool) {
//!     let users = PgUserRepository::new(pool.clone());
//!     let groups = PgGroupRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool);
//! }
//! ```

pub mod group_repository;
pub mod message_repository;
pub mod user_repository;

pub use group_repository::PgGroupRepository;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;
