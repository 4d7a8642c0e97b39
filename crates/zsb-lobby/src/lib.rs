//! Code-addressed pre-match lobbies.
//!
//! A lobby's ordered roster *is* the spawn assignment: position n is
//! spawn index n, kept dense across leaves. The match server never
//! trusts a client-supplied index; it asks for the claim.
mod code;
mod lobby;
mod service;

pub use code::*;
pub use lobby::*;
pub use service::*;
