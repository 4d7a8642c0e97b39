use super::*;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::LISTING_MAX_HOURS;
use zsb_core::LISTING_MIN_FEE;
use zsb_core::LISTING_MIN_HOURS;
use zsb_core::OpCache;
use zsb_core::UnixMillis;
use zsb_inventory::Character;
use zsb_inventory::InventoryService;
use zsb_inventory::ItemInstance;
use zsb_inventory::StashDelta;

/// Result of creating a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOk {
    pub listing_id: ID<Listing>,
    pub fee_paid: Gold,
    pub version: u64,
    pub delta: StashDelta,
}

/// Result of buying a listing. The buyer's delta reconciles their client;
/// the seller's surfaces on their next snapshot or via the same response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyOk {
    pub listing_id: ID<Listing>,
    pub price: Gold,
    pub seller_credit: Gold,
    pub version: u64,
    pub delta: StashDelta,
    pub seller_version: u64,
    pub seller_delta: StashDelta,
}

/// Listing fee: 5% of the asking price, minimum one gold, charged up
/// front and never refunded.
pub fn listing_fee(price: Gold) -> Gold {
    (price * 5 / 100).max(LISTING_MIN_FEE)
}

/// Seller proceeds after the 5% sale fee.
pub fn sale_credit(price: Gold) -> Gold {
    price - price * 5 / 100
}

/// Escrow-backed listings. Lock order is market state, then inventory,
/// matching the raid service convention.
pub struct MarketService {
    inventory: Arc<InventoryService>,
    listings: Mutex<HashMap<ID<Listing>, Listing>>,
    ops: OpCache,
}

impl MarketService {
    pub fn new(inventory: Arc<InventoryService>) -> Self {
        Self {
            inventory,
            listings: Mutex::new(HashMap::new()),
            ops: OpCache::new(),
        }
    }
    fn lock(&self) -> MutexGuard<'_, HashMap<ID<Listing>, Listing>> {
        self.listings.lock().expect("market lock")
    }
    pub fn listing(&self, id: ID<Listing>) -> Option<Listing> {
        self.lock().get(&id).cloned()
    }
    /// Active listings, freshest first. Expired entries are filtered, not
    /// yet transitioned; the sweep owns the transition.
    pub fn browse(&self) -> Vec<Listing> {
        let now = zsb_core::now_millis();
        let mut listings: Vec<Listing> = self
            .lock()
            .values()
            .filter(|l| l.status == ListingStatus::Active && !l.is_expired(now))
            .cloned()
            .collect();
        listings.sort_by_key(|l| std::cmp::Reverse(l.created_at));
        listings
    }
    pub fn mine(&self, seller: ID<Character>) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .lock()
            .values()
            .filter(|l| l.seller == seller)
            .cloned()
            .collect();
        listings.sort_by_key(|l| std::cmp::Reverse(l.created_at));
        listings
    }
}

impl MarketService {
    /// Charges the listing fee, escrows the item, registers the listing.
    /// If the escrow lock fails after the fee was charged, the fee is
    /// refunded; the fee is otherwise non-refundable.
    pub fn create(
        &self,
        seller: ID<Character>,
        op_id: &str,
        iid: ID<ItemInstance>,
        price: Gold,
        duration_hours: u64,
    ) -> Result<CreateOk, MarketError> {
        let mut listings = self.lock();
        if let Some(hit) = self.replay::<CreateOk>(op_id) {
            return Ok(hit);
        }
        if price < 1 {
            return Err(MarketError::PriceOutOfRange);
        }
        if !(LISTING_MIN_HOURS..=LISTING_MAX_HOURS).contains(&duration_hours) {
            return Err(MarketError::DurationOutOfRange);
        }
        let def_id = self
            .inventory
            .character(seller)
            .ok_or(MarketError::Inventory(
                zsb_inventory::InventoryError::CharacterNotFound,
            ))?
            .items
            .get(&iid)
            .map(|i| i.def_id.clone())
            .ok_or(MarketError::Inventory(
                zsb_inventory::InventoryError::ItemNotFound,
            ))?;
        let fee = listing_fee(price);
        self.inventory.spend_gold(seller, fee)?;
        let id: ID<Listing> = ID::default();
        let escrowed = match self.inventory.lock_for_escrow(seller, iid, id.cast()) {
            Ok(ok) => ok,
            Err(e) => {
                let _ = self.inventory.add_gold(seller, fee);
                return Err(e.into());
            }
        };
        let now = zsb_core::now_millis();
        let listing = Listing {
            id,
            seller,
            iid,
            def_id,
            price,
            fee_paid: fee,
            status: ListingStatus::Active,
            created_at: now,
            expires_at: now + duration_hours * 3_600_000,
            closed_at: None,
        };
        listings.insert(id, listing);
        log::info!("[market] listed {} at {} gold (fee {})", iid, price, fee);
        let ok = CreateOk {
            listing_id: id,
            fee_paid: fee,
            version: escrowed.version,
            delta: escrowed.delta,
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    /// Returns the item from escrow. The listing fee stays spent.
    pub fn cancel(
        &self,
        character: ID<Character>,
        listing_id: ID<Listing>,
    ) -> Result<zsb_inventory::MutationOk, MarketError> {
        let mut listings = self.lock();
        let listing = listings
            .get(&listing_id)
            .ok_or(MarketError::ListingNotFound)?;
        if listing.seller != character {
            return Err(MarketError::NotYourListing);
        }
        if listing.status != ListingStatus::Active {
            return Err(MarketError::ListingNotActive);
        }
        let returned = self
            .inventory
            .return_from_escrow(character, listing_id.cast())?;
        let listing = listings.get_mut(&listing_id).expect("present above");
        listing.status = ListingStatus::Cancelled;
        listing.closed_at = Some(zsb_core::now_millis());
        log::info!("[market] cancelled listing {}", listing_id);
        Ok(returned)
    }

    /// Spends the buyer's gold, transfers the item, credits the seller net
    /// of the sale fee. A transfer failure after the spend refunds the
    /// buyer and leaves the listing Active.
    pub fn buy(
        &self,
        buyer: ID<Character>,
        op_id: &str,
        listing_id: ID<Listing>,
    ) -> Result<BuyOk, MarketError> {
        let mut listings = self.lock();
        if let Some(hit) = self.replay::<BuyOk>(op_id) {
            return Ok(hit);
        }
        let now = zsb_core::now_millis();
        let listing = listings
            .get(&listing_id)
            .ok_or(MarketError::ListingNotFound)?
            .clone();
        if listing.status != ListingStatus::Active {
            return Err(MarketError::ListingNotActive);
        }
        if listing.is_expired(now) {
            // expire on read, then report it
            if let Ok(_) = self
                .inventory
                .return_from_escrow(listing.seller, listing_id.cast())
            {
                let listing = listings.get_mut(&listing_id).expect("present above");
                listing.status = ListingStatus::Expired;
                listing.closed_at = Some(now);
            }
            return Err(MarketError::ListingExpired);
        }
        if listing.seller == buyer {
            return Err(MarketError::SelfPurchase);
        }
        self.inventory.spend_gold(buyer, listing.price)?;
        let transfer = match self
            .inventory
            .transfer_item(listing.seller, buyer, listing.iid)
        {
            Ok(t) => t,
            Err(e) => {
                let _ = self.inventory.add_gold(buyer, listing.price);
                return Err(e.into());
            }
        };
        let credit = sale_credit(listing.price);
        let _ = self.inventory.add_gold(listing.seller, credit);
        let entry = listings.get_mut(&listing_id).expect("present above");
        entry.status = ListingStatus::Sold;
        entry.closed_at = Some(now);
        log::info!(
            "[market] listing {} sold for {} ({} to seller)",
            listing_id,
            listing.price,
            credit
        );
        let ok = BuyOk {
            listing_id,
            price: listing.price,
            seller_credit: credit,
            version: transfer.buyer_version,
            delta: transfer.buyer_delta,
            seller_version: transfer.seller_version,
            seller_delta: transfer.seller_delta,
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    /// Periodic sweep: every Active listing past expiry returns its item
    /// and becomes Expired. Returns the number of listings expired.
    pub fn expire_stale(&self) -> usize {
        self.sweep(zsb_core::now_millis())
    }
    fn sweep(&self, now: UnixMillis) -> usize {
        let mut listings = self.lock();
        let stale: Vec<Listing> = listings
            .values()
            .filter(|l| l.is_expired(now))
            .cloned()
            .collect();
        for listing in &stale {
            if let Err(e) = self
                .inventory
                .return_from_escrow(listing.seller, listing.id.cast())
            {
                log::warn!("[market] expiry return failed for {}: {}", listing.id, e);
            }
            let entry = listings.get_mut(&listing.id).expect("from this map");
            entry.status = ListingStatus::Expired;
            entry.closed_at = Some(now);
            log::info!("[market] listing {} expired", listing.id);
        }
        stale.len()
    }
}

/// Idempotency plumbing; checked and recorded under the listings lock.
impl MarketService {
    fn replay<T: serde::de::DeserializeOwned>(&self, op_id: &str) -> Option<T> {
        self.ops
            .lookup(op_id)
            .map(|hit| serde_json::from_str(&hit).expect("replay cached market op"))
    }
    fn commit<T: Serialize>(&self, op_id: &str, ok: &T) {
        self.ops
            .record(op_id, &serde_json::to_string(ok).expect("serialize market op"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsb_inventory::Catalog;
    use zsb_inventory::InventoryError;
    use zsb_inventory::ItemCategory;
    use zsb_inventory::ItemDef;
    use zsb_inventory::ItemFlags;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![ItemDef {
            id: "medkit".into(),
            name: "Medkit".into(),
            category: ItemCategory::Medical,
            tags: vec![],
            width: 2,
            height: 2,
            max_stack: 1,
            base_value: 120,
        }]))
    }

    struct Fixture {
        inventory: Arc<InventoryService>,
        market: MarketService,
        seller: ID<Character>,
        buyer: ID<Character>,
        medkit: ID<ItemInstance>,
    }

    fn fixture() -> Fixture {
        let inventory = Arc::new(InventoryService::new(catalog()));
        let seller = inventory.register_character("acct-1", "Rook", 10, 10).id;
        let buyer = inventory.register_character("acct-2", "Scav", 10, 10).id;
        inventory.add_gold(seller, 100).unwrap();
        inventory.add_gold(buyer, 2000).unwrap();
        let medkit = inventory
            .grant(seller, "medkit", 1, ItemFlags::default())
            .unwrap()
            .iid;
        let market = MarketService::new(inventory.clone());
        Fixture {
            inventory,
            market,
            seller,
            buyer,
            medkit,
        }
    }

    fn world_items(f: &Fixture) -> usize {
        f.inventory.character(f.seller).unwrap().items.len()
            + f.inventory.character(f.buyer).unwrap().items.len()
    }

    #[test]
    fn fee_is_five_percent_with_a_floor() {
        assert_eq!(listing_fee(1000), 50);
        assert_eq!(listing_fee(10), 1);
        assert_eq!(listing_fee(1), 1);
        assert_eq!(sale_credit(1000), 950);
    }
    #[test]
    fn market_round_trip_moves_gold_and_item() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 24)
            .unwrap();
        assert_eq!(created.fee_paid, 50);
        assert_eq!(f.inventory.character(f.seller).unwrap().gold, 50);
        assert!(
            f.inventory
                .character(f.seller)
                .unwrap()
                .stash
                .placement(f.medkit)
                .is_none()
        );
        let bought = f
            .market
            .buy(f.buyer, "op-buy", created.listing_id)
            .unwrap();
        assert_eq!(bought.seller_credit, 950);
        assert_eq!(f.inventory.character(f.buyer).unwrap().gold, 1000);
        assert_eq!(f.inventory.character(f.seller).unwrap().gold, 1000);
        assert!(
            f.inventory
                .character(f.buyer)
                .unwrap()
                .items
                .contains_key(&f.medkit)
        );
        assert_eq!(
            f.market.listing(created.listing_id).unwrap().status,
            ListingStatus::Sold
        );
    }
    #[test]
    fn escrow_is_zero_sum_across_operations() {
        let f = fixture();
        let before = world_items(&f);
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 500, 24)
            .unwrap();
        assert_eq!(world_items(&f), before);
        f.market.buy(f.buyer, "op-buy", created.listing_id).unwrap();
        assert_eq!(world_items(&f), before);
    }
    #[test]
    fn cancel_returns_the_item_but_not_the_fee() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 24)
            .unwrap();
        f.market.cancel(f.seller, created.listing_id).unwrap();
        let seller = f.inventory.character(f.seller).unwrap();
        assert_eq!(seller.gold, 50);
        assert!(seller.stash.placement(f.medkit).is_some());
        assert!(seller.items[&f.medkit].is_unlocked());
        assert_eq!(
            f.market.listing(created.listing_id).unwrap().status,
            ListingStatus::Cancelled
        );
    }
    #[test]
    fn cancel_is_owner_only() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 24)
            .unwrap();
        assert_eq!(
            f.market.cancel(f.buyer, created.listing_id).err(),
            Some(MarketError::NotYourListing)
        );
    }
    #[test]
    fn self_purchase_is_rejected() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 24)
            .unwrap();
        assert_eq!(
            f.market.buy(f.seller, "op-buy", created.listing_id).err(),
            Some(MarketError::SelfPurchase)
        );
    }
    #[test]
    fn underfunded_buyer_changes_nothing() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1999, 24)
            .unwrap();
        let poor = f.inventory.register_character("acct-3", "Vagrant", 4, 4).id;
        assert_eq!(
            f.market.buy(poor, "op-buy", created.listing_id).err(),
            Some(MarketError::Inventory(InventoryError::InsufficientFunds))
        );
        assert_eq!(
            f.market.listing(created.listing_id).unwrap().status,
            ListingStatus::Active
        );
    }
    #[test]
    fn insufficient_fee_blocks_the_listing() {
        let f = fixture();
        let broke = f.inventory.register_character("acct-3", "Vagrant", 6, 6).id;
        let item = f
            .inventory
            .grant(broke, "medkit", 1, ItemFlags::default())
            .unwrap();
        assert_eq!(
            f.market.create(broke, "op-x", item.iid, 1000, 24).err(),
            Some(MarketError::Inventory(InventoryError::InsufficientFunds))
        );
        assert!(
            f.inventory
                .character(broke)
                .unwrap()
                .items[&item.iid]
                .is_unlocked()
        );
    }
    #[test]
    fn price_and_duration_are_validated() {
        let f = fixture();
        assert_eq!(
            f.market.create(f.seller, "op-a", f.medkit, 0, 24).err(),
            Some(MarketError::PriceOutOfRange)
        );
        assert_eq!(
            f.market.create(f.seller, "op-b", f.medkit, 100, 0).err(),
            Some(MarketError::DurationOutOfRange)
        );
        assert_eq!(
            f.market.create(f.seller, "op-c", f.medkit, 100, 73).err(),
            Some(MarketError::DurationOutOfRange)
        );
    }
    #[test]
    fn expiry_sweep_returns_items() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 1)
            .unwrap();
        let listing = f.market.listing(created.listing_id).unwrap();
        assert_eq!(f.market.sweep(listing.expires_at + 1), 1);
        assert_eq!(
            f.market.listing(created.listing_id).unwrap().status,
            ListingStatus::Expired
        );
        let seller = f.inventory.character(f.seller).unwrap();
        assert!(seller.items[&f.medkit].is_unlocked());
        assert!(seller.stash.placement(f.medkit).is_some());
    }
    #[test]
    fn buy_replays_on_the_same_op_id() {
        let f = fixture();
        let created = f
            .market
            .create(f.seller, "op-list", f.medkit, 1000, 24)
            .unwrap();
        let first = f.market.buy(f.buyer, "op-buy", created.listing_id).unwrap();
        let replay = f.market.buy(f.buyer, "op-buy", created.listing_id).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&replay).unwrap()
        );
        // gold moved exactly once
        assert_eq!(f.inventory.character(f.buyer).unwrap().gold, 1000);
        assert_eq!(f.inventory.character(f.seller).unwrap().gold, 1000);
    }
    #[test]
    fn locked_item_cannot_be_listed_and_fee_is_refunded() {
        let f = fixture();
        f.inventory
            .lock_for_raid(f.seller, &[f.medkit], ID::default())
            .unwrap();
        let gold = f.inventory.character(f.seller).unwrap().gold;
        assert_eq!(
            f.market.create(f.seller, "op-x", f.medkit, 1000, 24).err(),
            Some(MarketError::Inventory(InventoryError::ItemLockedRaid))
        );
        assert_eq!(f.inventory.character(f.seller).unwrap().gold, gold);
    }
}
