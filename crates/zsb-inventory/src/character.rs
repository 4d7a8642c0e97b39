use super::*;
use serde::Serialize;
use std::collections::HashMap;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::PlayerId;
use zsb_core::Reputation;
use zsb_core::XP_PER_LEVEL;

/// A player character: stash, wallet, items, trader standings.
/// `version` increases by exactly one on every successful mutation and
/// never moves on a failed one.
#[derive(Debug, Clone)]
pub struct Character {
    pub id: ID<Character>,
    pub account_id: PlayerId,
    pub name: String,
    pub xp: u64,
    pub gold: Gold,
    pub stash: Stash,
    pub items: HashMap<ID<ItemInstance>, ItemInstance>,
    pub reputations: HashMap<String, Reputation>,
    pub version: u64,
}

impl Character {
    pub fn new(account_id: &str, name: &str, width: u32, height: u32) -> Self {
        Self {
            id: ID::default(),
            account_id: account_id.to_string(),
            name: name.to_string(),
            xp: 0,
            gold: 0,
            stash: Stash::new(width, height),
            items: HashMap::new(),
            reputations: HashMap::new(),
            version: 0,
        }
    }
    /// Derived level; xp itself is a bare counter.
    pub fn level(&self) -> u64 {
        1 + self.xp / XP_PER_LEVEL
    }
    pub fn reputation(&self, trader: &str) -> Reputation {
        self.reputations.get(trader).copied().unwrap_or(0.0)
    }
    pub fn item(&self, iid: ID<ItemInstance>) -> Result<&ItemInstance, InventoryError> {
        self.items.get(&iid).ok_or(InventoryError::ItemNotFound)
    }
    pub fn item_mut(&mut self, iid: ID<ItemInstance>) -> Result<&mut ItemInstance, InventoryError> {
        self.items.get_mut(&iid).ok_or(InventoryError::ItemNotFound)
    }
}

/// Read-only view of a character for clients: stash, items, wallet, version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub character_id: ID<Character>,
    pub name: String,
    pub gold: Gold,
    pub xp: u64,
    pub level: u64,
    pub version: u64,
    pub stash_width: u32,
    pub stash_height: u32,
    pub items: Vec<ItemInstance>,
    pub placements: Vec<Placement>,
}

impl From<&Character> for Snapshot {
    fn from(character: &Character) -> Self {
        let mut items: Vec<ItemInstance> = character.items.values().cloned().collect();
        items.sort_by_key(|i| i.iid);
        let mut placements: Vec<Placement> = character.stash.placements().copied().collect();
        placements.sort_by_key(|p| p.iid);
        Self {
            character_id: character.id,
            name: character.name.clone(),
            gold: character.gold,
            xp: character.xp,
            level: character.level(),
            version: character.version,
            stash_width: character.stash.width,
            stash_height: character.stash.height,
            items,
            placements,
        }
    }
}
