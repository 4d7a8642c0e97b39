//! Per-character items, grid stash, wallet, and lock flags.
//!
//! The inventory is the single authority on item existence. The raid and
//! market services never touch items directly: they call the composite
//! operations here (`lock_for_raid`, `lock_for_escrow`, `transfer_item`,
//! `apply_raid_outcome`) so that every cross-service invariant lands inside
//! one critical section.
//!
//! ## Core Types
//!
//! - [`InventoryService`] — all mutations, idempotent by operation id
//! - [`Character`] — stash grid, wallet, items, version counter
//! - [`ItemInstance`] / [`ItemDef`] — instances vs. immutable definitions
//! - [`StashDelta`] — minimal change set clients apply to a snapshot
mod catalog;
mod character;
mod delta;
mod error;
mod item;
mod service;
mod stash;

pub use catalog::*;
pub use character::*;
pub use delta::*;
pub use error::*;
pub use item::*;
pub use service::*;
pub use stash::*;
