//! Presentation Layer
//!
//! HTTP routes, middleware and WebSocket chat sessions.

pub mod http;
pub mod websocket;
pub mod middleware;
