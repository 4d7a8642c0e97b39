//! Framed TCP traversal and session discovery protocol.
//!
//! Framing is `[u32 LE length][u8 type][payload]`, where length counts
//! the type byte plus payload. A connection may pipeline many requests.
//! There are no sequence ids; a response is the implicit reply to the
//! last request of matching kind. When a connection drops, every host it
//! registered is removed.
//!
//! ## Core Types
//!
//! - [`DiscoveryService`] — hosted-session table plus the registry view
//! - [`DiscoveryServer`] — tokio accept loop speaking the framed codec
//! - [`ClientMessage`] / [`ServerMessage`] — typed payloads
mod frame;
mod message;
mod server;

pub use frame::*;
pub use message::*;
pub use server::*;
