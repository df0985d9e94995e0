//! # Honey Realtime
//!
//! The realtime messaging layer of the Honey platform:
//! - WebSocket endpoints for direct and group chat
//! - Topic based fan-out between connections, optionally relayed across
//!   nodes through Redis pub/sub
//! - Presence tracking on the user record
//! - PostgreSQL for message storage
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, posting rules and repository traits
//! - **Application Layer**: Chat, presence and identity services and DTOs
//! - **Infrastructure Layer**: Database, Redis relay and metrics
//! - **Presentation Layer**: HTTP routes and WebSocket sessions
//!
//! ## Module Structure
//!
//! ```text
//! honey_realtime/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, services and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, pub/sub relay and metrics
//! +-- presentation/   HTTP routes and WebSocket chat
//! +-- shared/         Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
