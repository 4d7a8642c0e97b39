use super::*;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::Durability;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::OpCache;
use zsb_core::Reputation;
use zsb_core::StackCount;

/// Loot to mint, as carried in commit outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootSpec {
    pub def_id: String,
    pub stack: StackCount,
}

/// Post-raid wear on a surviving item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurabilityUpdate {
    pub iid: ID<ItemInstance>,
    pub durability: Durability,
}

/// Everything a raid commit applies to one character, landed in a single
/// critical section so concurrent readers see pre- or post-commit state,
/// never a half-applied mix.
#[derive(Debug, Clone)]
pub struct RaidOutcomeApply {
    pub character: ID<Character>,
    pub raid: ID<RaidLock>,
    pub minted: Vec<LootSpec>,
    pub removed: Vec<ID<ItemInstance>>,
    pub durability: Vec<DurabilityUpdate>,
    pub gold: Gold,
    pub xp: u64,
}

/// Result of applying a raid outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidApplyOk {
    pub version: u64,
    pub delta: StashDelta,
    pub minted: Vec<ItemInstance>,
}

/// Result of moving an escrowed item between characters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOk {
    pub seller_version: u64,
    pub seller_delta: StashDelta,
    pub buyer_version: u64,
    pub buyer_delta: StashDelta,
}

/// The single authority on characters and their items. One coarse lock;
/// every critical section is a short pure-memory mutation. Mutators taking
/// an `op_id` replay their committed response on retry.
pub struct InventoryService {
    catalog: Arc<Catalog>,
    characters: Mutex<HashMap<ID<Character>, Character>>,
    ops: OpCache,
}

impl InventoryService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            characters: Mutex::new(HashMap::new()),
            ops: OpCache::new(),
        }
    }
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
    fn lock(&self) -> MutexGuard<'_, HashMap<ID<Character>, Character>> {
        self.characters.lock().expect("inventory lock")
    }
    /// Footprint lookup closure for stash collision checks.
    fn footprints<'c>(
        catalog: &'c Catalog,
        character: &'c Character,
    ) -> impl Fn(ID<ItemInstance>, u8) -> Option<(u32, u32)> + 'c {
        move |iid, rotation| {
            character
                .items
                .get(&iid)
                .and_then(|i| catalog.def(&i.def_id))
                .map(|d| d.footprint(rotation))
        }
    }
}

/// Characters and reads.
impl InventoryService {
    pub fn register_character(
        &self,
        account_id: &str,
        name: &str,
        width: u32,
        height: u32,
    ) -> Character {
        let character = Character::new(account_id, name, width, height);
        let out = character.clone();
        self.lock().insert(character.id, character);
        log::debug!("[inventory] registered character {} ({})", out.id, name);
        out
    }
    pub fn character(&self, id: ID<Character>) -> Option<Character> {
        self.lock().get(&id).cloned()
    }
    pub fn character_by_account(&self, account_id: &str) -> Option<Character> {
        self.lock()
            .values()
            .find(|c| c.account_id == account_id)
            .cloned()
    }
    pub fn snapshot(&self, id: ID<Character>) -> Result<Snapshot, InventoryError> {
        self.lock()
            .get(&id)
            .map(Snapshot::from)
            .ok_or(InventoryError::CharacterNotFound)
    }
    /// Seeds an item directly into the stash, first-fit placed.
    pub fn grant(
        &self,
        id: ID<Character>,
        def_id: &str,
        stack: StackCount,
        flags: ItemFlags,
    ) -> Result<ItemInstance, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let def = self
            .catalog
            .def(def_id)
            .ok_or(InventoryError::ItemNotFound)?;
        let mut item = ItemInstance::new(def, stack);
        item.flags = flags;
        let slot = character
            .stash
            .first_fit(def.width, def.height, Self::footprints(&self.catalog, character));
        if let Some((x, y)) = slot {
            character.stash.place(Placement {
                iid: item.iid,
                x,
                y,
                rotation: 0,
            });
        }
        character.items.insert(item.iid, item.clone());
        character.version += 1;
        Ok(item)
    }
}

/// Stash mutators. Validation happens before the first write so a failed
/// call leaves the character untouched, version included.
impl InventoryService {
    pub fn move_item(
        &self,
        id: ID<Character>,
        op_id: &str,
        iid: ID<ItemInstance>,
        x: u32,
        y: u32,
        rotation: u8,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        if let Some(hit) = self.replay(op_id) {
            return Ok(hit);
        }
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let rotation = rotation.min(1);
        let item = character.item(iid)?;
        if item.in_raid() {
            return Err(InventoryError::ItemLockedRaid);
        }
        if item.in_escrow() {
            return Err(InventoryError::ItemLockedEscrow);
        }
        let def = self
            .catalog
            .def(&item.def_id)
            .ok_or(InventoryError::ItemNotFound)?;
        let (w, h) = def.footprint(rotation);
        if !character.stash.in_bounds(x, y, w, h) {
            return Err(InventoryError::PositionOutOfBounds);
        }
        let rect = Rect { x, y, w, h };
        if character
            .stash
            .collides(rect, Some(iid), Self::footprints(&self.catalog, character))
        {
            return Err(InventoryError::PositionBlocked);
        }
        let placement = Placement { iid, x, y, rotation };
        character.stash.place(placement);
        character.version += 1;
        let ok = MutationOk {
            version: character.version,
            delta: StashDelta::default().moving(placement),
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    pub fn split_stack(
        &self,
        id: ID<Character>,
        op_id: &str,
        iid: ID<ItemInstance>,
        amount: StackCount,
        x: u32,
        y: u32,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        if let Some(hit) = self.replay(op_id) {
            return Ok(hit);
        }
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let item = character.item(iid)?;
        if item.in_raid() {
            return Err(InventoryError::ItemLockedRaid);
        }
        if item.in_escrow() {
            return Err(InventoryError::ItemLockedEscrow);
        }
        let def = self
            .catalog
            .def(&item.def_id)
            .ok_or(InventoryError::ItemNotFound)?;
        if !def.is_stackable() || amount == 0 || amount >= item.stack {
            return Err(InventoryError::InvalidStack);
        }
        let (w, h) = def.footprint(0);
        if !character.stash.in_bounds(x, y, w, h) {
            return Err(InventoryError::PositionOutOfBounds);
        }
        let rect = Rect { x, y, w, h };
        if character
            .stash
            .collides(rect, None, Self::footprints(&self.catalog, character))
        {
            return Err(InventoryError::PositionBlocked);
        }
        let durability = item.durability;
        let mut split = ItemInstance::new(def, amount);
        split.durability = durability;
        let placement = Placement {
            iid: split.iid,
            x,
            y,
            rotation: 0,
        };
        character.stash.place(placement);
        let source = character.item_mut(iid).expect("validated above");
        source.stack -= amount;
        let source = source.clone();
        character.items.insert(split.iid, split.clone());
        character.version += 1;
        let ok = MutationOk {
            version: character.version,
            delta: StashDelta::default()
                .update(source)
                .add(split)
                .moving(placement),
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    pub fn discard_item(
        &self,
        id: ID<Character>,
        op_id: &str,
        iid: ID<ItemInstance>,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        if let Some(hit) = self.replay(op_id) {
            return Ok(hit);
        }
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let item = character.item(iid)?;
        if item.in_raid() {
            return Err(InventoryError::ItemLockedRaid);
        }
        if item.in_escrow() {
            return Err(InventoryError::ItemLockedEscrow);
        }
        character.stash.remove(iid);
        character.items.remove(&iid);
        character.version += 1;
        let ok = MutationOk {
            version: character.version,
            delta: StashDelta::default().remove(iid),
        };
        self.commit(op_id, &ok);
        Ok(ok)
    }

    pub fn update_durability(
        &self,
        id: ID<Character>,
        updates: &[DurabilityUpdate],
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let mut delta = StashDelta::default();
        for update in updates {
            if let Some(item) = character.items.get_mut(&update.iid) {
                item.durability = update.durability.clamp(0.0, 1.0);
                delta = delta.update(item.clone());
            }
        }
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta,
        })
    }
}

/// Wallet.
impl InventoryService {
    pub fn add_gold(&self, id: ID<Character>, amount: Gold) -> Result<Gold, InventoryError> {
        if amount < 0 {
            return Err(InventoryError::InvalidAmount);
        }
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        character.gold += amount;
        character.version += 1;
        Ok(character.gold)
    }
    /// Fails without change when the balance is short or the amount negative.
    pub fn spend_gold(&self, id: ID<Character>, amount: Gold) -> Result<Gold, InventoryError> {
        if amount < 0 {
            return Err(InventoryError::InvalidAmount);
        }
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        if character.gold < amount {
            return Err(InventoryError::InsufficientFunds);
        }
        character.gold -= amount;
        character.version += 1;
        Ok(character.gold)
    }
    pub fn add_xp(&self, id: ID<Character>, amount: u64) -> Result<u64, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        character.xp += amount;
        character.version += 1;
        Ok(character.xp)
    }
    /// Nudges a trader standing, clamped to [-1, 1].
    pub fn adjust_reputation(
        &self,
        id: ID<Character>,
        trader: &str,
        delta: Reputation,
    ) -> Result<Reputation, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let rep = (character.reputation(trader) + delta).clamp(-1.0, 1.0);
        character.reputations.insert(trader.to_string(), rep);
        character.version += 1;
        Ok(rep)
    }
}

/// Stack consumption, used by trader sales.
impl InventoryService {
    /// Removes `quantity` units from a stack, dropping the instance (and
    /// its placement) when it reaches zero. The item must be unlocked.
    pub fn consume_stack(
        &self,
        id: ID<Character>,
        iid: ID<ItemInstance>,
        quantity: StackCount,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let item = character.item(iid)?;
        if item.in_raid() {
            return Err(InventoryError::ItemLockedRaid);
        }
        if item.in_escrow() {
            return Err(InventoryError::ItemLockedEscrow);
        }
        if quantity == 0 || quantity > item.stack {
            return Err(InventoryError::InvalidStack);
        }
        let mut delta = StashDelta::default();
        if quantity == item.stack {
            character.items.remove(&iid);
            character.stash.remove(iid);
            delta = delta.remove(iid);
        } else {
            let item = character.item_mut(iid).expect("validated above");
            item.stack -= quantity;
            delta = delta.update(item.clone());
        }
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta,
        })
    }
}

/// Raid lock lifecycle.
impl InventoryService {
    /// All-or-nothing: if any item is missing or already locked, no flags
    /// are set. The atomicity is externally visible.
    pub fn lock_for_raid(
        &self,
        id: ID<Character>,
        iids: &[ID<ItemInstance>],
        raid: ID<RaidLock>,
    ) -> Result<Vec<ID<ItemInstance>>, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let unique: BTreeSet<ID<ItemInstance>> = iids.iter().copied().collect();
        for iid in &unique {
            let item = character.item(*iid)?;
            if item.in_raid() || item.in_escrow() {
                return Err(InventoryError::ItemsAlreadyLocked);
            }
        }
        for iid in &unique {
            character
                .item_mut(*iid)
                .expect("validated above")
                .lock_raid(raid);
        }
        character.version += 1;
        Ok(unique.into_iter().collect())
    }
    /// Clears the raid lock from every item the raid holds.
    pub fn unlock_raid_items(
        &self,
        id: ID<Character>,
        raid: ID<RaidLock>,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let mut delta = StashDelta::default();
        for item in character.items.values_mut() {
            if item.flags.raid_id == Some(raid) {
                item.unlock_raid();
                delta = delta.update(item.clone());
            }
        }
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta,
        })
    }
    /// Silently drops missing iids. Used after a death.
    pub fn remove_items(
        &self,
        id: ID<Character>,
        iids: &[ID<ItemInstance>],
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let mut delta = StashDelta::default();
        for iid in iids {
            if character.items.remove(iid).is_some() {
                character.stash.remove(*iid);
                delta = delta.remove(*iid);
            }
        }
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta,
        })
    }
    /// Mints new instances, splitting oversize stacks, auto-placing each
    /// first-fit. An instance that fits nowhere is still owned, just
    /// invisible in the grid until moved.
    pub fn mint_loot(
        &self,
        id: ID<Character>,
        specs: &[LootSpec],
    ) -> Result<(MutationOk, Vec<ItemInstance>), InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        for spec in specs {
            if self.catalog.def(&spec.def_id).is_none() {
                return Err(InventoryError::ItemNotFound);
            }
        }
        let (delta, minted) = Self::mint_into(&self.catalog, character, specs);
        character.version += 1;
        let ok = MutationOk {
            version: character.version,
            delta,
        };
        Ok((ok, minted))
    }
    /// Shared mint path; caller has already validated the def ids.
    fn mint_into(
        catalog: &Catalog,
        character: &mut Character,
        specs: &[LootSpec],
    ) -> (StashDelta, Vec<ItemInstance>) {
        let mut delta = StashDelta::default();
        let mut minted = Vec::new();
        for spec in specs {
            let def = catalog.def(&spec.def_id).expect("validated by caller");
            let mut remaining = spec.stack.max(1);
            while remaining > 0 {
                let stack = remaining.min(def.max_stack);
                remaining -= stack;
                let item = ItemInstance::new(def, stack);
                let slot = character
                    .stash
                    .first_fit(def.width, def.height, Self::footprints(catalog, character));
                if let Some((x, y)) = slot {
                    let placement = Placement {
                        iid: item.iid,
                        x,
                        y,
                        rotation: 0,
                    };
                    character.stash.place(placement);
                    delta = delta.moving(placement);
                }
                character.items.insert(item.iid, item.clone());
                delta = delta.add(item.clone());
                minted.push(item);
            }
        }
        (delta, minted)
    }
}

/// Escrow lifecycle, called only by the market.
impl InventoryService {
    /// Hides the item from the stash and stamps the listing as its owner.
    pub fn lock_for_escrow(
        &self,
        id: ID<Character>,
        iid: ID<ItemInstance>,
        listing: ID<EscrowLock>,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let item = character.item(iid)?;
        if item.in_raid() {
            return Err(InventoryError::ItemLockedRaid);
        }
        if item.in_escrow() {
            return Err(InventoryError::ItemLockedEscrow);
        }
        if item.flags.non_tradeable {
            return Err(InventoryError::ItemNonTradeable);
        }
        if item.flags.quest_bound {
            return Err(InventoryError::ItemQuestBound);
        }
        character.stash.remove(iid);
        character
            .item_mut(iid)
            .expect("validated above")
            .lock_escrow(listing);
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta: StashDelta::default().remove(iid),
        })
    }
    /// Returns an escrowed item to its owner's stash, first-fit placed.
    pub fn return_from_escrow(
        &self,
        id: ID<Character>,
        listing: ID<EscrowLock>,
    ) -> Result<MutationOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars.get_mut(&id).ok_or(InventoryError::CharacterNotFound)?;
        let iid = character
            .items
            .values()
            .find(|i| i.flags.escrow_listing_id == Some(listing))
            .map(|i| i.iid)
            .ok_or(InventoryError::ItemNotFound)?;
        character
            .item_mut(iid)
            .expect("found above")
            .unlock_escrow();
        let mut delta = StashDelta::default();
        let def_id = character.item(iid).expect("found above").def_id.clone();
        if let Some(def) = self.catalog.def(&def_id) {
            let slot = character
                .stash
                .first_fit(def.width, def.height, Self::footprints(&self.catalog, character));
            if let Some((x, y)) = slot {
                let placement = Placement {
                    iid,
                    x,
                    y,
                    rotation: 0,
                };
                character.stash.place(placement);
                delta = delta.moving(placement);
            }
        }
        delta = delta.add(character.item(iid).expect("found above").clone());
        character.version += 1;
        Ok(MutationOk {
            version: character.version,
            delta,
        })
    }
    /// Moves an escrowed item from seller to buyer in one critical section.
    /// The world item count is invariant across the transfer.
    pub fn transfer_item(
        &self,
        from: ID<Character>,
        to: ID<Character>,
        iid: ID<ItemInstance>,
    ) -> Result<TransferOk, InventoryError> {
        let mut chars = self.lock();
        if !chars.contains_key(&to) {
            return Err(InventoryError::CharacterNotFound);
        }
        let seller = chars
            .get_mut(&from)
            .ok_or(InventoryError::CharacterNotFound)?;
        if !seller.item(iid)?.in_escrow() {
            return Err(InventoryError::ItemNotFound);
        }
        let mut item = seller.items.remove(&iid).expect("validated above");
        seller.stash.remove(iid);
        seller.version += 1;
        let seller_version = seller.version;
        item.unlock_escrow();
        let buyer = chars.get_mut(&to).expect("checked above");
        let mut buyer_delta = StashDelta::default();
        if let Some(def) = self.catalog.def(&item.def_id) {
            let slot = buyer
                .stash
                .first_fit(def.width, def.height, Self::footprints(&self.catalog, buyer));
            if let Some((x, y)) = slot {
                let placement = Placement {
                    iid,
                    x,
                    y,
                    rotation: 0,
                };
                buyer.stash.place(placement);
                buyer_delta = buyer_delta.moving(placement);
            }
        }
        buyer_delta = buyer_delta.add(item.clone());
        buyer.items.insert(iid, item);
        buyer.version += 1;
        Ok(TransferOk {
            seller_version,
            seller_delta: StashDelta::default().remove(iid),
            buyer_version: buyer.version,
            buyer_delta,
        })
    }
}

/// Raid commit application.
impl InventoryService {
    /// Applies an entire raid outcome in one critical section: removals,
    /// durability, minted loot, gold, xp, then the residual unlock. A
    /// concurrent reader sees the whole outcome or none of it.
    pub fn apply_raid_outcome(&self, apply: RaidOutcomeApply) -> Result<RaidApplyOk, InventoryError> {
        let mut chars = self.lock();
        let character = chars
            .get_mut(&apply.character)
            .ok_or(InventoryError::CharacterNotFound)?;
        for spec in &apply.minted {
            if self.catalog.def(&spec.def_id).is_none() {
                return Err(InventoryError::ItemNotFound);
            }
        }
        if apply.gold < 0 {
            return Err(InventoryError::InvalidAmount);
        }
        let mut delta = StashDelta::default();
        for iid in &apply.removed {
            if character.items.remove(iid).is_some() {
                character.stash.remove(*iid);
                delta = delta.remove(*iid);
            }
        }
        for update in &apply.durability {
            if let Some(item) = character.items.get_mut(&update.iid) {
                item.durability = update.durability.clamp(0.0, 1.0);
            }
        }
        let (mint_delta, minted) = Self::mint_into(&self.catalog, character, &apply.minted);
        delta = delta.merge(mint_delta);
        character.gold += apply.gold;
        character.xp += apply.xp;
        for item in character.items.values_mut() {
            if item.flags.raid_id == Some(apply.raid) {
                item.unlock_raid();
                delta = delta.update(item.clone());
            }
        }
        character.version += 1;
        Ok(RaidApplyOk {
            version: character.version,
            delta,
            minted,
        })
    }
}

/// Idempotency plumbing. The cache is checked and written while the
/// character table lock is held, so a retried opId always observes the
/// committed result.
impl InventoryService {
    fn replay(&self, op_id: &str) -> Option<MutationOk> {
        self.ops
            .lookup(op_id)
            .map(|hit| serde_json::from_str(&hit).expect("replay cached mutation"))
    }
    fn commit(&self, op_id: &str, ok: &MutationOk) {
        self.ops
            .record(op_id, &serde_json::to_string(ok).expect("serialize mutation"));
    }
}
