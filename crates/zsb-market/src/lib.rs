//! Player-to-player market built on inventory escrow.
//!
//! Listings never copy item references: creating one moves the item into
//! escrow, buying transfers it, cancelling or expiring returns it. The
//! world item count is invariant under every market operation.
//!
//! ## Core Types
//!
//! - [`MarketService`] — create/cancel/buy/expire, idempotent by opId
//! - [`Listing`] — one escrowed item offered at a price
mod error;
mod listing;
mod service;

pub use error::*;
pub use listing::*;
pub use service::*;
