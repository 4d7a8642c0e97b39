use serde::Deserialize;
use serde::Serialize;
use zsb_core::Durability;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::StackCount;
use zsb_core::UnixMillis;

/// Marker for raid lock ownership. The raid service casts its session ids
/// into this so the inventory never depends on the raid crate.
pub struct RaidLock;
/// Marker for escrow ownership. The market casts listing ids into this.
pub struct EscrowLock;

/// Broad item grouping used for trader category gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Weapon,
    Armor,
    Rig,
    Bag,
    Ammo,
    Medical,
    Food,
    Material,
    Quest,
    Misc,
}

/// Immutable item definition from the seed catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub category: ItemCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default = "one")]
    pub max_stack: StackCount,
    pub base_value: Gold,
}

fn one() -> StackCount {
    1
}

impl ItemDef {
    pub fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }
    /// Grid footprint, honoring the 90° rotation swap.
    pub fn footprint(&self, rotation: u8) -> (u32, u32) {
        match rotation {
            0 => (self.width, self.height),
            _ => (self.height, self.width),
        }
    }
}

/// Lock and trade flags on an instance. The boolean tags and their owner
/// ids move together; only [`ItemInstance`] setters touch them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFlags {
    pub in_raid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_id: Option<ID<RaidLock>>,
    pub in_escrow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow_listing_id: Option<ID<EscrowLock>>,
    pub insured: bool,
    pub non_tradeable: bool,
    pub quest_bound: bool,
}

/// A concrete owned item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInstance {
    pub iid: ID<ItemInstance>,
    pub def_id: String,
    pub stack: StackCount,
    pub durability: Durability,
    pub mods: Vec<String>,
    pub flags: ItemFlags,
    pub created_at: UnixMillis,
}

impl ItemInstance {
    pub fn new(def: &ItemDef, stack: StackCount) -> Self {
        Self {
            iid: ID::default(),
            def_id: def.id.clone(),
            stack: stack.clamp(1, def.max_stack),
            durability: 1.0,
            mods: Vec::new(),
            flags: ItemFlags::default(),
            created_at: zsb_core::now_millis(),
        }
    }
    pub fn in_raid(&self) -> bool {
        self.flags.in_raid
    }
    pub fn in_escrow(&self) -> bool {
        self.flags.in_escrow
    }
    /// Free to move, split, discard, list, or sell.
    pub fn is_unlocked(&self) -> bool {
        !self.in_raid() && !self.in_escrow()
    }
    pub fn lock_raid(&mut self, raid: ID<RaidLock>) {
        self.flags.in_raid = true;
        self.flags.raid_id = Some(raid);
    }
    pub fn unlock_raid(&mut self) {
        self.flags.in_raid = false;
        self.flags.raid_id = None;
    }
    pub fn lock_escrow(&mut self, listing: ID<EscrowLock>) {
        self.flags.in_escrow = true;
        self.flags.escrow_listing_id = Some(listing);
    }
    pub fn unlock_escrow(&mut self) {
        self.flags.in_escrow = false;
        self.flags.escrow_listing_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifle() -> ItemDef {
        ItemDef {
            id: "rifle_762".to_string(),
            name: "Rifle".to_string(),
            category: ItemCategory::Weapon,
            tags: vec![],
            width: 4,
            height: 2,
            max_stack: 1,
            base_value: 800,
        }
    }

    #[test]
    fn rotation_swaps_footprint() {
        let def = rifle();
        assert_eq!(def.footprint(0), (4, 2));
        assert_eq!(def.footprint(1), (2, 4));
    }
    #[test]
    fn stack_clamps_to_definition() {
        let def = rifle();
        assert_eq!(ItemInstance::new(&def, 99).stack, 1);
    }
    #[test]
    fn lock_setters_keep_tag_and_owner_together() {
        let mut item = ItemInstance::new(&rifle(), 1);
        assert!(item.is_unlocked());
        item.lock_raid(ID::default());
        assert!(item.in_raid());
        assert!(item.flags.raid_id.is_some());
        item.unlock_raid();
        assert!(item.is_unlocked());
        assert!(item.flags.raid_id.is_none());
    }
}
