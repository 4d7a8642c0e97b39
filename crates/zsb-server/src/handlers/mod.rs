//! Route handlers: parse the typed request, dispatch to a service,
//! serialize the result or the stable error kind.
pub mod character;
pub mod friends;
pub mod game;
pub mod lobby;
pub mod market;
pub mod matchmaking;
pub mod raid;
pub mod servers;
pub mod trader;
