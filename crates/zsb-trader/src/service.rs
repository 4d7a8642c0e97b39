use super::*;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::OpCache;
use zsb_core::Reputation;
use zsb_core::StackCount;
use zsb_core::TRADER_REP_GAIN_BUY;
use zsb_core::TRADER_REP_GAIN_SELL;
use zsb_inventory::Character;
use zsb_inventory::InventoryError;
use zsb_inventory::InventoryService;
use zsb_inventory::ItemInstance;
use zsb_inventory::LootSpec;
use zsb_inventory::StashDelta;

/// One catalog line as a specific character sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    pub offer_id: String,
    pub def_id: String,
    pub base_price: Gold,
    pub price: Gold,
    pub remaining_stock: i64,
    pub min_level: u64,
    pub min_reputation: Reputation,
    pub available: bool,
}

/// Result of buying from a trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderBuyOk {
    pub gold_spent: Gold,
    pub remaining_stock: i64,
    pub reputation: Reputation,
    pub version: u64,
    pub delta: StashDelta,
}

/// Result of selling to a trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderSellOk {
    pub gold_gained: Gold,
    pub reputation: Reputation,
    pub version: u64,
    pub delta: StashDelta,
}

/// Static trader catalog plus the one piece of mutable state: per-offer
/// remaining stock.
pub struct TraderService {
    inventory: Arc<InventoryService>,
    traders: HashMap<String, TraderDef>,
    stock: Mutex<HashMap<(String, String), i64>>,
    ops: OpCache,
}

impl TraderService {
    pub fn new(inventory: Arc<InventoryService>, defs: Vec<TraderDef>) -> Self {
        let stock = defs
            .iter()
            .flat_map(|t| {
                t.offers
                    .iter()
                    .map(|o| ((t.id.clone(), o.id.clone()), o.stock))
            })
            .collect();
        Self {
            inventory,
            traders: defs.into_iter().map(|t| (t.id.clone(), t)).collect(),
            stock: Mutex::new(stock),
            ops: OpCache::new(),
        }
    }
    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), i64>> {
        self.stock.lock().expect("trader stock lock")
    }
    pub fn traders(&self) -> Vec<&TraderDef> {
        let mut traders: Vec<&TraderDef> = self.traders.values().collect();
        traders.sort_by(|a, b| a.id.cmp(&b.id));
        traders
    }
    pub fn trader(&self, id: &str) -> Result<&TraderDef, TraderError> {
        self.traders.get(id).ok_or(TraderError::TraderNotFound)
    }
    /// The catalog priced and gated for one character.
    pub fn offers(
        &self,
        trader_id: &str,
        character: ID<Character>,
    ) -> Result<Vec<OfferView>, TraderError> {
        let trader = self.trader(trader_id)?;
        let viewer = self
            .inventory
            .character(character)
            .ok_or(TraderError::Inventory(InventoryError::CharacterNotFound))?;
        let rep = viewer.reputation(trader_id);
        let stock = self.lock();
        Ok(trader
            .offers
            .iter()
            .map(|o| {
                let remaining = stock
                    .get(&(trader_id.to_string(), o.id.clone()))
                    .copied()
                    .unwrap_or(o.stock);
                OfferView {
                    offer_id: o.id.clone(),
                    def_id: o.def_id.clone(),
                    base_price: o.price,
                    price: buy_price(o.price, rep),
                    remaining_stock: remaining,
                    min_level: o.min_level,
                    min_reputation: o.min_reputation,
                    available: remaining != 0
                        && viewer.level() >= o.min_level
                        && rep >= o.min_reputation,
                }
            })
            .collect())
    }
}

impl TraderService {
    /// Spends gold at the reputation-adjusted price, mints the items, and
    /// decrements finite stock.
    pub fn buy(
        &self,
        character: ID<Character>,
        op_id: &str,
        trader_id: &str,
        offer_id: &str,
        quantity: StackCount,
    ) -> Result<TraderBuyOk, TraderError> {
        let mut stock = self.lock();
        if let Some(hit) = self.replay::<TraderBuyOk>(op_id) {
            return Ok(hit);
        }
        let trader = self.traders.get(trader_id).ok_or(TraderError::TraderNotFound)?;
        let offer = trader.offer(offer_id).ok_or(TraderError::OfferNotFound)?;
        if quantity == 0 {
            return Err(TraderError::Inventory(InventoryError::InvalidStack));
        }
        let buyer = self
            .inventory
            .character(character)
            .ok_or(TraderError::Inventory(InventoryError::CharacterNotFound))?;
        if buyer.level() < offer.min_level {
            return Err(TraderError::LevelTooLow);
        }
        let rep = buyer.reputation(trader_id);
        if rep < offer.min_reputation {
            return Err(TraderError::ReputationTooLow);
        }
        let key = (trader_id.to_string(), offer_id.to_string());
        let remaining = stock.get(&key).copied().unwrap_or(offer.stock);
        if remaining >= 0 && (remaining as u64) < quantity as u64 {
            return Err(TraderError::OutOfStock);
        }
        let total = buy_price(offer.price, rep) * quantity as Gold;
        self.inventory.spend_gold(character, total)?;
        let minted = match self.inventory.mint_loot(
            character,
            &[LootSpec {
                def_id: offer.def_id.clone(),
                stack: quantity,
            }],
        ) {
            Ok((ok, _)) => ok,
            Err(e) => {
                let _ = self.inventory.add_gold(character, total);
                return Err(e.into());
            }
        };
        let remaining = if remaining >= 0 {
            let left = remaining - quantity as i64;
            stock.insert(key, left);
            left
        } else {
            remaining
        };
        let reputation = self
            .inventory
            .adjust_reputation(character, trader_id, TRADER_REP_GAIN_BUY * quantity as Reputation)?;
        log::info!(
            "[trader] {} bought {}x{} for {} gold",
            character,
            quantity,
            offer.def_id,
            total
        );
        let ok = TraderBuyOk {
            gold_spent: total,
            remaining_stock: remaining,
            reputation,
            version: minted.version,
            delta: minted.delta,
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    /// Credits value × buyback rate × durability × quantity and consumes
    /// the stack.
    pub fn sell(
        &self,
        character: ID<Character>,
        op_id: &str,
        trader_id: &str,
        iid: ID<ItemInstance>,
        quantity: StackCount,
    ) -> Result<TraderSellOk, TraderError> {
        let _stock = self.lock();
        if let Some(hit) = self.replay::<TraderSellOk>(op_id) {
            return Ok(hit);
        }
        let trader = self.traders.get(trader_id).ok_or(TraderError::TraderNotFound)?;
        let seller = self
            .inventory
            .character(character)
            .ok_or(TraderError::Inventory(InventoryError::CharacterNotFound))?;
        let item = seller
            .items
            .get(&iid)
            .ok_or(TraderError::Inventory(InventoryError::ItemNotFound))?;
        if item.flags.non_tradeable {
            return Err(TraderError::Inventory(InventoryError::ItemNonTradeable));
        }
        if item.flags.quest_bound {
            return Err(TraderError::Inventory(InventoryError::ItemQuestBound));
        }
        let def = self
            .inventory
            .catalog()
            .def(&item.def_id)
            .ok_or(TraderError::Inventory(InventoryError::ItemNotFound))?;
        if !trader.accepts(def.category) {
            return Err(TraderError::CategoryNotAccepted);
        }
        let rep = seller.reputation(trader_id);
        let credit = sell_credit(
            def.base_value,
            buyback_rate(trader.buyback_rate, rep),
            item.durability,
            quantity,
        );
        let consumed = self.inventory.consume_stack(character, iid, quantity)?;
        let _ = self.inventory.add_gold(character, credit);
        let reputation = self.inventory.adjust_reputation(
            character,
            trader_id,
            TRADER_REP_GAIN_SELL * quantity as Reputation,
        )?;
        log::info!(
            "[trader] {} sold {}x{} for {} gold",
            character,
            quantity,
            def.id,
            credit
        );
        let ok = TraderSellOk {
            gold_gained: credit,
            reputation,
            version: consumed.version,
            delta: consumed.delta,
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    /// Resets every finite stock to its definition default. Returns the
    /// number of offers restocked.
    pub fn restock_all(&self) -> usize {
        let mut stock = self.lock();
        let mut restocked = 0;
        for trader in self.traders.values() {
            for offer in &trader.offers {
                let key = (trader.id.clone(), offer.id.clone());
                if stock.get(&key) != Some(&offer.stock) {
                    stock.insert(key, offer.stock);
                    restocked += 1;
                }
            }
        }
        if restocked > 0 {
            log::info!("[trader] restocked {} offers", restocked);
        }
        restocked
    }
}

/// Idempotency plumbing; checked and recorded under the stock lock.
impl TraderService {
    fn replay<T: serde::de::DeserializeOwned>(&self, op_id: &str) -> Option<T> {
        self.ops
            .lookup(op_id)
            .map(|hit| serde_json::from_str(&hit).expect("replay cached trader op"))
    }
    fn commit<T: Serialize>(&self, op_id: &str, ok: &T) {
        self.ops
            .record(op_id, &serde_json::to_string(ok).expect("serialize trader op"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsb_inventory::Catalog;
    use zsb_inventory::ItemCategory;
    use zsb_inventory::ItemDef;
    use zsb_inventory::ItemFlags;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            ItemDef {
                id: "medkit".into(),
                name: "Medkit".into(),
                category: ItemCategory::Medical,
                tags: vec![],
                width: 2,
                height: 2,
                max_stack: 1,
                base_value: 120,
            },
            ItemDef {
                id: "ammo_762".into(),
                name: "7.62 Rounds".into(),
                category: ItemCategory::Ammo,
                tags: vec![],
                width: 1,
                height: 1,
                max_stack: 60,
                base_value: 2,
            },
        ]))
    }

    fn defs() -> Vec<TraderDef> {
        vec![TraderDef {
            id: "doc".into(),
            name: "Doc".into(),
            buyback_rate: 0.5,
            accepted_categories: vec![ItemCategory::Medical],
            offers: vec![
                TraderOffer {
                    id: "doc_medkit".into(),
                    def_id: "medkit".into(),
                    price: 200,
                    stock: 3,
                    min_level: 1,
                    min_reputation: 0.0,
                },
                TraderOffer {
                    id: "doc_ammo".into(),
                    def_id: "ammo_762".into(),
                    price: 3,
                    stock: -1,
                    min_level: 5,
                    min_reputation: 0.0,
                },
            ],
        }]
    }

    struct Fixture {
        inventory: Arc<InventoryService>,
        trader: TraderService,
        character: ID<Character>,
    }

    fn fixture() -> Fixture {
        let inventory = Arc::new(InventoryService::new(catalog()));
        let character = inventory.register_character("acct-1", "Rook", 10, 10).id;
        inventory.add_gold(character, 1000).unwrap();
        let trader = TraderService::new(inventory.clone(), defs());
        Fixture {
            inventory,
            trader,
            character,
        }
    }

    #[test]
    fn buying_decrements_finite_stock() {
        let f = fixture();
        let ok = f
            .trader
            .buy(f.character, "op-a", "doc", "doc_medkit", 2)
            .unwrap();
        assert_eq!(ok.gold_spent, 400);
        assert_eq!(ok.remaining_stock, 1);
        assert_eq!(
            f.trader
                .buy(f.character, "op-b", "doc", "doc_medkit", 2)
                .err(),
            Some(TraderError::OutOfStock)
        );
    }
    #[test]
    fn level_gate_blocks_low_characters() {
        let f = fixture();
        assert_eq!(
            f.trader
                .buy(f.character, "op-a", "doc", "doc_ammo", 30)
                .err(),
            Some(TraderError::LevelTooLow)
        );
        f.inventory.add_xp(f.character, 5000).unwrap();
        assert!(f.trader.buy(f.character, "op-b", "doc", "doc_ammo", 30).is_ok());
    }
    #[test]
    fn underfunded_purchase_changes_nothing() {
        let f = fixture();
        f.inventory.spend_gold(f.character, 950).unwrap();
        let before = f.inventory.character(f.character).unwrap();
        assert_eq!(
            f.trader
                .buy(f.character, "op-a", "doc", "doc_medkit", 3)
                .err(),
            Some(TraderError::Inventory(InventoryError::InsufficientFunds))
        );
        let after = f.inventory.character(f.character).unwrap();
        assert_eq!(after.gold, before.gold);
        assert_eq!(after.items.len(), before.items.len());
    }
    #[test]
    fn selling_credits_by_durability_and_buyback() {
        let f = fixture();
        let item = f
            .inventory
            .grant(f.character, "medkit", 1, ItemFlags::default())
            .unwrap();
        let ok = f
            .trader
            .sell(f.character, "op-a", "doc", item.iid, 1)
            .unwrap();
        // 120 * 0.5 * 1.0 * 1
        assert_eq!(ok.gold_gained, 60);
        assert!(
            !f.inventory
                .character(f.character)
                .unwrap()
                .items
                .contains_key(&item.iid)
        );
    }
    #[test]
    fn category_gate_rejects_off_brand_items() {
        let f = fixture();
        let ammo = f
            .inventory
            .grant(f.character, "ammo_762", 30, ItemFlags::default())
            .unwrap();
        assert_eq!(
            f.trader.sell(f.character, "op-a", "doc", ammo.iid, 30).err(),
            Some(TraderError::CategoryNotAccepted)
        );
    }
    #[test]
    fn partial_stack_sale_keeps_the_remainder() {
        let f = fixture();
        let trader = TraderService::new(
            f.inventory.clone(),
            vec![TraderDef {
                id: "fence".into(),
                name: "Fence".into(),
                buyback_rate: 0.5,
                accepted_categories: vec![],
                offers: vec![],
            }],
        );
        let ammo = f
            .inventory
            .grant(f.character, "ammo_762", 60, ItemFlags::default())
            .unwrap();
        trader.sell(f.character, "op-a", "fence", ammo.iid, 20).unwrap();
        assert_eq!(
            f.inventory.character(f.character).unwrap().items[&ammo.iid].stack,
            40
        );
    }
    #[test]
    fn reputation_accrues_and_discounts() {
        let f = fixture();
        f.trader
            .buy(f.character, "op-a", "doc", "doc_medkit", 2)
            .unwrap();
        let rep = f.inventory.character(f.character).unwrap().reputation("doc");
        assert!((rep - 0.002).abs() < 1e-6);
        let offers = f.trader.offers("doc", f.character).unwrap();
        let medkit = offers.iter().find(|o| o.offer_id == "doc_medkit").unwrap();
        assert!(medkit.price <= 200);
    }
    #[test]
    fn restock_resets_finite_offers() {
        let f = fixture();
        f.trader
            .buy(f.character, "op-a", "doc", "doc_medkit", 1)
            .unwrap();
        assert_eq!(f.trader.restock_all(), 1);
        let offers = f.trader.offers("doc", f.character).unwrap();
        let medkit = offers.iter().find(|o| o.offer_id == "doc_medkit").unwrap();
        assert_eq!(medkit.remaining_stock, 3);
    }
    #[test]
    fn buy_replays_on_the_same_op_id() {
        let f = fixture();
        let first = f
            .trader
            .buy(f.character, "op-a", "doc", "doc_medkit", 1)
            .unwrap();
        let replay = f
            .trader
            .buy(f.character, "op-a", "doc", "doc_medkit", 1)
            .unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&replay).unwrap()
        );
        assert_eq!(f.inventory.character(f.character).unwrap().gold, 1000 - 200);
    }
}
