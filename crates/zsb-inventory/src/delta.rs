use super::*;
use serde::Deserialize;
use serde::Serialize;
use zsb_core::ID;

/// Minimal change set for a client to reconcile against its snapshot.
/// Escrow transitions surface as `removed` (hide from grid) and
/// `added` + `moved` (restore to grid); flag-only changes as `updated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashDelta {
    pub added: Vec<ItemInstance>,
    pub removed: Vec<ID<ItemInstance>>,
    pub updated: Vec<ItemInstance>,
    pub moved: Vec<Placement>,
}

impl StashDelta {
    pub fn add(mut self, item: ItemInstance) -> Self {
        self.added.push(item);
        self
    }
    pub fn remove(mut self, iid: ID<ItemInstance>) -> Self {
        self.removed.push(iid);
        self
    }
    pub fn update(mut self, item: ItemInstance) -> Self {
        self.updated.push(item);
        self
    }
    pub fn moving(mut self, placement: Placement) -> Self {
        self.moved.push(placement);
        self
    }
    pub fn merge(mut self, other: StashDelta) -> Self {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.updated.extend(other.updated);
        self.moved.extend(other.moved);
        self
    }
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
    }
}

/// Successful mutation: the character's new version plus the delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOk {
    pub version: u64,
    pub delta: StashDelta,
}
