//! Player presence, friend graph, and game invites.
//!
//! No durable history: the directory is a live view. Invites are culled
//! on read once their TTL lapses; a newer invite from the same sender
//! replaces the old one.
mod directory;
mod presence;

pub use directory::*;
pub use presence::*;
