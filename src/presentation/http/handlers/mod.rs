//! HTTP Handlers
//!
//! Request handlers for the health endpoints.

pub mod health;
