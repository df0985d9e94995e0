//! WebSocket Chat
//!
//! Real-time chat over WebSocket connections: envelope codec, routing
//! fabric, per-connection sessions and the upgrade handlers.

pub mod envelope;
pub mod fabric;
pub mod handler;
pub mod session;

pub use envelope::{decode, InboundEnvelope, OutboundEnvelope};
pub use fabric::{ConnectionId, FabricStats, Mailbox, RoutingFabric, Topic};
pub use handler::{direct_chat_handler, group_chat_handler};
pub use session::{ChatTarget, ConnectionSession, SessionContext, SessionState};
