//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Redis pub/sub relay between nodes
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod pubsub;
pub mod repositories;
