use serde::Deserialize;
use zsb_core::Gold;
use zsb_core::StackCount;
use zsb_inventory::Character;
use zsb_inventory::InventoryService;
use zsb_inventory::ItemDef;
use zsb_inventory::ItemFlags;
use zsb_trader::TraderDef;

/// Built-in catalog used when `ZSB_SEED_FILE` is unset.
const EMBEDDED_SEED: &str = include_str!("../seed.json");

/// One item granted to a seeded character.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedItem {
    pub def_id: String,
    #[serde(default = "one")]
    pub stack: StackCount,
    #[serde(default)]
    pub insured: bool,
    #[serde(default)]
    pub non_tradeable: bool,
    #[serde(default)]
    pub quest_bound: bool,
}

fn one() -> StackCount {
    1
}

/// A character created at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedCharacter {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub gold: Gold,
    pub stash_width: u32,
    pub stash_height: u32,
    #[serde(default)]
    pub items: Vec<SeedItem>,
}

/// Everything the backend seeds in place of a durable database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    pub item_defs: Vec<ItemDef>,
    pub traders: Vec<TraderDef>,
    #[serde(default)]
    pub characters: Vec<SeedCharacter>,
}

impl SeedData {
    pub fn embedded() -> Self {
        serde_json::from_str(EMBEDDED_SEED).expect("parse embedded seed")
    }
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
    /// Creates the seeded characters with their wallets and items.
    pub fn seed_characters(&self, inventory: &InventoryService) -> Vec<Character> {
        self.characters
            .iter()
            .map(|seed| {
                let character = inventory.register_character(
                    &seed.account_id,
                    &seed.name,
                    seed.stash_width,
                    seed.stash_height,
                );
                if seed.gold > 0 {
                    inventory
                        .add_gold(character.id, seed.gold)
                        .expect("seed gold");
                }
                for item in &seed.items {
                    let flags = ItemFlags {
                        insured: item.insured,
                        non_tradeable: item.non_tradeable,
                        quest_bound: item.quest_bound,
                        ..ItemFlags::default()
                    };
                    if let Err(e) = inventory.grant(character.id, &item.def_id, item.stack, flags) {
                        log::warn!(
                            "[seed] skipped {} for {}: {}",
                            item.def_id,
                            seed.name,
                            e
                        );
                    }
                }
                inventory.character(character.id).expect("just seeded")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zsb_inventory::Catalog;

    #[test]
    fn embedded_seed_parses_and_is_coherent() {
        let seed = SeedData::embedded();
        assert!(!seed.item_defs.is_empty());
        assert!(!seed.traders.is_empty());
        // every trader offer and seeded item references a known def
        let catalog = Catalog::new(seed.item_defs.clone());
        for trader in &seed.traders {
            for offer in &trader.offers {
                assert!(
                    catalog.def(&offer.def_id).is_some(),
                    "offer {} references unknown def {}",
                    offer.id,
                    offer.def_id
                );
            }
        }
        for character in &seed.characters {
            for item in &character.items {
                assert!(catalog.def(&item.def_id).is_some());
            }
        }
    }
    #[test]
    fn characters_seed_with_items_placed() {
        let seed = SeedData::embedded();
        let inventory = InventoryService::new(Arc::new(Catalog::new(seed.item_defs.clone())));
        let characters = seed.seed_characters(&inventory);
        assert_eq!(characters.len(), seed.characters.len());
        let rook = &characters[0];
        assert_eq!(rook.gold, 1500);
        assert_eq!(rook.items.len(), 5);
        assert!(rook.items.values().any(|i| i.flags.insured));
        assert!(rook.items.values().any(|i| i.flags.quest_bound));
    }
}
