use super::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::ID;
use zsb_core::PlayerId;
use zsb_core::RAID_ACTIVE_TIMEOUT;
use zsb_core::UnixMillis;
use zsb_inventory::Character;
use zsb_inventory::InventoryError;
use zsb_inventory::InventoryService;
use zsb_inventory::ItemInstance;
use zsb_inventory::RaidOutcomeApply;
use zsb_inventory::StashDelta;

/// Result of a successful prepare: the registered raid and its locks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareOk {
    pub raid_id: ID<RaidSession>,
    pub locked_iids: Vec<ID<ItemInstance>>,
    pub expires_at: UnixMillis,
}

/// Loadout plus materialized instances for the match server to hydrate
/// the player with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadoutView {
    pub loadout: Loadout,
    pub items: Vec<ItemInstance>,
}

/// Inventory effect of one committed outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitApplied {
    pub character_id: ID<Character>,
    pub version: u64,
    pub delta: StashDelta,
    pub minted: Vec<ItemInstance>,
}

/// Result of a committed raid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOk {
    pub raid_id: ID<RaidSession>,
    pub results: Vec<CommitApplied>,
}

#[derive(Default)]
struct State {
    raids: HashMap<ID<RaidSession>, RaidSession>,
    by_character: HashMap<ID<Character>, ID<RaidSession>>,
}

/// Owns raid sessions and drives the prepare → start → commit lifecycle.
/// Lock order is always raid state, then inventory; the inverse never
/// happens, so the two services cannot deadlock.
pub struct RaidService {
    inventory: Arc<InventoryService>,
    secret: String,
    state: Mutex<State>,
}

impl RaidService {
    pub fn new(inventory: Arc<InventoryService>, secret: &str) -> Self {
        Self {
            inventory,
            secret: secret.to_string(),
            state: Mutex::new(State::default()),
        }
    }
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("raid lock")
    }
    fn authenticate(&self, secret: &str) -> Result<(), RaidError> {
        if secret == self.secret {
            Ok(())
        } else {
            Err(RaidError::InvalidServerSecret)
        }
    }
    pub fn raid(&self, id: ID<RaidSession>) -> Option<RaidSession> {
        self.lock().raids.get(&id).cloned()
    }
    pub fn raid_by_character(&self, character: ID<Character>) -> Option<RaidSession> {
        let state = self.lock();
        state
            .by_character
            .get(&character)
            .and_then(|id| state.raids.get(id))
            .cloned()
    }
}

/// Player-side lifecycle.
impl RaidService {
    /// Locks the loadout and registers a Preparing raid. A character with a
    /// live raid is rejected unless that raid has expired, in which case it
    /// is cleaned up first.
    pub fn prepare(
        &self,
        character: ID<Character>,
        lobby_id: Option<String>,
        loadout: Loadout,
    ) -> Result<PrepareOk, RaidError> {
        let mut state = self.lock();
        if let Some(existing) = state.by_character.get(&character).copied() {
            let expired = state
                .raids
                .get(&existing)
                .map(|r| r.is_expired(zsb_core::now_millis()))
                .unwrap_or(true);
            if expired {
                self.release(&mut state, existing, "expired");
            } else {
                return Err(RaidError::AlreadyInRaid);
            }
        }
        let mut session = RaidSession::new(character, lobby_id, loadout);
        let iids = session.loadout.iids();
        session.locked = self
            .inventory
            .lock_for_raid(character, &iids, session.id.cast())?;
        let ok = PrepareOk {
            raid_id: session.id,
            locked_iids: session.locked.clone(),
            expires_at: session.expires_at,
        };
        log::info!(
            "[raid] prepared {} for character {} ({} items locked)",
            session.id,
            character,
            session.locked.len()
        );
        state.by_character.insert(character, session.id);
        state.raids.insert(session.id, session);
        Ok(ok)
    }
    /// Unlocks and drops a raid that has not started yet.
    pub fn cancel(
        &self,
        character: ID<Character>,
        raid_id: ID<RaidSession>,
    ) -> Result<(), RaidError> {
        let mut state = self.lock();
        let raid = state.raids.get(&raid_id).ok_or(RaidError::RaidNotFound)?;
        if raid.character != character {
            return Err(RaidError::NotYourRaid);
        }
        if raid.status != RaidStatus::Preparing {
            return Err(RaidError::RaidNotPreparing);
        }
        self.release(&mut state, raid_id, "cancelled");
        Ok(())
    }
}

/// Match-server-side lifecycle. Every call authenticates the shared secret.
impl RaidService {
    /// Preparing → Active; stamps the match and extends expiry to the raid
    /// timeout.
    pub fn start(
        &self,
        secret: &str,
        raid_id: ID<RaidSession>,
        match_id: ID<MatchRef>,
        players: &[PlayerId],
    ) -> Result<(), RaidError> {
        self.authenticate(secret)?;
        let mut state = self.lock();
        let raid = state
            .raids
            .get_mut(&raid_id)
            .ok_or(RaidError::RaidNotFound)?;
        if raid.status != RaidStatus::Preparing {
            return Err(RaidError::RaidNotPreparing);
        }
        raid.status = RaidStatus::Active;
        raid.match_id = Some(match_id);
        raid.expires_at = zsb_core::now_millis() + RAID_ACTIVE_TIMEOUT.as_millis() as UnixMillis;
        log::info!(
            "[raid] {} active on match {} ({} players)",
            raid_id,
            match_id,
            players.len()
        );
        Ok(())
    }
    /// Read-only loadout materialization for player hydration.
    pub fn loadout(
        &self,
        secret: &str,
        raid_id: ID<RaidSession>,
        character: ID<Character>,
    ) -> Result<LoadoutView, RaidError> {
        self.authenticate(secret)?;
        let state = self.lock();
        let raid = state.raids.get(&raid_id).ok_or(RaidError::RaidNotFound)?;
        if raid.character != character {
            return Err(RaidError::NotYourRaid);
        }
        let owner = self
            .inventory
            .character(character)
            .ok_or(RaidError::Inventory(InventoryError::CharacterNotFound))?;
        let items = raid
            .locked
            .iter()
            .filter_map(|iid| owner.items.get(iid))
            .cloned()
            .collect();
        Ok(LoadoutView {
            loadout: raid.loadout.clone(),
            items,
        })
    }
    /// The anti-dupe cornerstone. At most one commit per raid ever touches
    /// the inventory; a signature or match mismatch aborts with no state
    /// change; a second attempt reports `already_committed`.
    pub fn commit(
        &self,
        secret: &str,
        raid_id: ID<RaidSession>,
        match_id: ID<MatchRef>,
        outcomes: &[CommitOutcome],
        signature: &str,
    ) -> Result<CommitOk, RaidError> {
        self.authenticate(secret)?;
        let mut state = self.lock();
        let raid = state.raids.get(&raid_id).ok_or(RaidError::RaidNotFound)?;
        if raid.status == RaidStatus::Committed {
            return Err(RaidError::AlreadyCommitted);
        }
        if raid.match_id != Some(match_id) {
            return Err(RaidError::MatchMismatch);
        }
        if sign_commit(raid_id, match_id, outcomes, &self.secret) != signature {
            log::warn!("[raid] rejected forged commit for {}", raid_id);
            return Err(RaidError::InvalidSignature);
        }
        let character = raid.character;
        let locked = raid.locked.clone();
        let mut results = Vec::new();
        for outcome in outcomes.iter().filter(|o| o.character_id == character) {
            let apply = match outcome.status {
                OutcomeStatus::Extracted => RaidOutcomeApply {
                    character,
                    raid: raid_id.cast(),
                    minted: outcome.provisional_loot.clone(),
                    removed: outcome.lost_iids.clone(),
                    durability: outcome.durability_updates.clone(),
                    gold: outcome.gold_gained,
                    xp: outcome.xp_gained,
                },
                OutcomeStatus::Died => RaidOutcomeApply {
                    character,
                    raid: raid_id.cast(),
                    minted: Vec::new(),
                    removed: self.uninsured(character, &locked)?,
                    durability: Vec::new(),
                    gold: 0,
                    xp: 0,
                },
            };
            let applied = self.inventory.apply_raid_outcome(apply)?;
            results.push(CommitApplied {
                character_id: character,
                version: applied.version,
                delta: applied.delta,
                minted: applied.minted,
            });
        }
        let raid = state
            .raids
            .get_mut(&raid_id)
            .expect("present earlier in this critical section");
        raid.status = RaidStatus::Committed;
        raid.committed_at = Some(zsb_core::now_millis());
        state.by_character.remove(&character);
        log::info!("[raid] committed {}", raid_id);
        Ok(CommitOk { raid_id, results })
    }
    /// Locked items that die with the character: everything not insured.
    /// Insured items survive and come back with the residual unlock.
    fn uninsured(
        &self,
        character: ID<Character>,
        locked: &[ID<ItemInstance>],
    ) -> Result<Vec<ID<ItemInstance>>, RaidError> {
        let owner = self
            .inventory
            .character(character)
            .ok_or(RaidError::Inventory(InventoryError::CharacterNotFound))?;
        Ok(locked
            .iter()
            .copied()
            .filter(|iid| {
                owner
                    .items
                    .get(iid)
                    .map(|i| !i.flags.insured)
                    .unwrap_or(false)
            })
            .collect())
    }
}

/// Expiry sweep.
impl RaidService {
    /// Cleans every non-terminal raid whose expiry has passed, releasing
    /// its locks. Returns the number of raids cleaned.
    pub fn cleanup_expired(&self) -> usize {
        self.sweep(zsb_core::now_millis())
    }
    fn sweep(&self, now: UnixMillis) -> usize {
        let mut state = self.lock();
        let expired: Vec<ID<RaidSession>> = state
            .raids
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id)
            .collect();
        for id in &expired {
            self.release(&mut state, *id, "expired");
        }
        expired.len()
    }
    /// Drops a raid and returns its locks. Shared by cancel, expiry, and
    /// the stale-raid path in prepare.
    fn release(&self, state: &mut State, raid_id: ID<RaidSession>, reason: &str) {
        if let Some(raid) = state.raids.remove(&raid_id) {
            if state.by_character.get(&raid.character) == Some(&raid_id) {
                state.by_character.remove(&raid.character);
            }
            if let Err(e) = self
                .inventory
                .unlock_raid_items(raid.character, raid_id.cast())
            {
                log::warn!("[raid] unlock after {} failed for {}: {}", reason, raid_id, e);
            }
            log::info!("[raid] {} released ({})", raid_id, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsb_inventory::Catalog;
    use zsb_inventory::ItemCategory;
    use zsb_inventory::ItemDef;
    use zsb_inventory::ItemFlags;

    const SECRET: &str = "test-secret";

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            ItemDef {
                id: "rifle_762".into(),
                name: "Rifle".into(),
                category: ItemCategory::Weapon,
                tags: vec![],
                width: 4,
                height: 2,
                max_stack: 1,
                base_value: 800,
            },
            ItemDef {
                id: "armor_soft".into(),
                name: "Soft Armor".into(),
                category: ItemCategory::Armor,
                tags: vec![],
                width: 3,
                height: 3,
                max_stack: 1,
                base_value: 400,
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

    struct Fixture {
        inventory: Arc<InventoryService>,
        raids: RaidService,
        character: ID<Character>,
        rifle: ID<ItemInstance>,
        armor: ID<ItemInstance>,
    }

    fn fixture() -> Fixture {
        let inventory = Arc::new(InventoryService::new(catalog()));
        let character = inventory.register_character("acct-1", "Rook", 10, 10).id;
        let rifle = inventory
            .grant(character, "rifle_762", 1, ItemFlags::default())
            .unwrap()
            .iid;
        let armor = inventory
            .grant(character, "armor_soft", 1, ItemFlags::default())
            .unwrap()
            .iid;
        let raids = RaidService::new(inventory.clone(), SECRET);
        Fixture {
            inventory,
            raids,
            character,
            rifle,
            armor,
        }
    }

    fn loadout(rifle: ID<ItemInstance>, armor: ID<ItemInstance>) -> Loadout {
        Loadout {
            primary: Some(rifle),
            armor: Some(armor),
            ..Loadout::default()
        }
    }

    fn active_raid(f: &Fixture) -> (ID<RaidSession>, ID<MatchRef>) {
        let prepared = f
            .raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        let match_id = ID::default();
        f.raids
            .start(SECRET, prepared.raid_id, match_id, &["p1".into()])
            .unwrap();
        (prepared.raid_id, match_id)
    }

    #[test]
    fn prepare_locks_the_loadout() {
        let f = fixture();
        let prepared = f
            .raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        assert_eq!(prepared.locked_iids.len(), 2);
        let owner = f.inventory.character(f.character).unwrap();
        assert!(owner.items[&f.rifle].in_raid());
        assert_eq!(
            f.inventory.move_item(f.character, "op-a", f.rifle, 0, 0, 0),
            Err(InventoryError::ItemLockedRaid)
        );
    }
    #[test]
    fn second_prepare_is_rejected_while_live() {
        let f = fixture();
        f.raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        assert_eq!(
            f.raids
                .prepare(f.character, None, Loadout::default())
                .err(),
            Some(RaidError::AlreadyInRaid)
        );
    }
    #[test]
    fn start_requires_the_shared_secret() {
        let f = fixture();
        let prepared = f
            .raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        assert_eq!(
            f.raids
                .start("wrong", prepared.raid_id, ID::default(), &[])
                .err(),
            Some(RaidError::InvalidServerSecret)
        );
    }
    #[test]
    fn extract_commit_applies_the_outcome_once() {
        let f = fixture();
        let (raid_id, match_id) = active_raid(&f);
        let outcomes = vec![CommitOutcome {
            character_id: f.character,
            status: OutcomeStatus::Extracted,
            provisional_loot: vec![zsb_inventory::LootSpec {
                def_id: "ammo_762".into(),
                stack: 30,
            }],
            lost_iids: vec![f.armor],
            durability_updates: vec![zsb_inventory::DurabilityUpdate {
                iid: f.rifle,
                durability: 0.8,
            }],
            gold_gained: 500,
            xp_gained: 120,
        }];
        let signature = sign_commit(raid_id, match_id, &outcomes, SECRET);
        let ok = f
            .raids
            .commit(SECRET, raid_id, match_id, &outcomes, &signature)
            .unwrap();
        assert_eq!(ok.results.len(), 1);
        let owner = f.inventory.character(f.character).unwrap();
        assert!(!owner.items.contains_key(&f.armor));
        assert!((owner.items[&f.rifle].durability - 0.8).abs() < 1e-6);
        assert!(owner.items[&f.rifle].is_unlocked());
        assert_eq!(owner.gold, 500);
        assert_eq!(owner.xp, 120);
        // second commit: error, no further state change
        let again = f
            .raids
            .commit(SECRET, raid_id, match_id, &outcomes, &signature)
            .err();
        assert_eq!(again, Some(RaidError::AlreadyCommitted));
        let after = f.inventory.character(f.character).unwrap();
        assert_eq!(after.gold, 500);
        assert_eq!(after.items.len(), owner.items.len());
    }
    #[test]
    fn forged_commit_leaves_everything_untouched() {
        let f = fixture();
        let (raid_id, match_id) = active_raid(&f);
        let outcomes = vec![CommitOutcome {
            character_id: f.character,
            status: OutcomeStatus::Extracted,
            provisional_loot: vec![zsb_inventory::LootSpec {
                def_id: "ammo_762".into(),
                stack: 30,
            }],
            lost_iids: vec![],
            durability_updates: vec![],
            gold_gained: 500,
            xp_gained: 0,
        }];
        let signature = sign_commit(raid_id, match_id, &outcomes, SECRET);
        // alter the payload after signing
        let mut forged = outcomes.clone();
        forged[0].provisional_loot.push(zsb_inventory::LootSpec {
            def_id: "ammo_762".into(),
            stack: 60,
        });
        let before = f.inventory.character(f.character).unwrap();
        assert_eq!(
            f.raids
                .commit(SECRET, raid_id, match_id, &forged, &signature)
                .err(),
            Some(RaidError::InvalidSignature)
        );
        let after = f.inventory.character(f.character).unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.gold, before.gold);
        assert_eq!(f.raids.raid(raid_id).unwrap().status, RaidStatus::Active);
        // a subsequent well-formed commit still succeeds
        assert!(
            f.raids
                .commit(SECRET, raid_id, match_id, &outcomes, &signature)
                .is_ok()
        );
    }
    #[test]
    fn commit_rejects_a_wrong_match() {
        let f = fixture();
        let (raid_id, _) = active_raid(&f);
        let other: ID<MatchRef> = ID::default();
        let outcomes = vec![];
        let signature = sign_commit(raid_id, other, &outcomes, SECRET);
        assert_eq!(
            f.raids
                .commit(SECRET, raid_id, other, &outcomes, &signature)
                .err(),
            Some(RaidError::MatchMismatch)
        );
    }
    #[test]
    fn death_removes_only_uninsured_items() {
        let inventory = Arc::new(InventoryService::new(catalog()));
        let character = inventory.register_character("acct-1", "Rook", 10, 10).id;
        let rifle = inventory
            .grant(character, "rifle_762", 1, ItemFlags::default())
            .unwrap()
            .iid;
        let armor = inventory
            .grant(
                character,
                "armor_soft",
                1,
                ItemFlags {
                    insured: true,
                    ..ItemFlags::default()
                },
            )
            .unwrap()
            .iid;
        let raids = RaidService::new(inventory.clone(), SECRET);
        let prepared = raids
            .prepare(character, None, loadout(rifle, armor))
            .unwrap();
        let match_id = ID::default();
        raids.start(SECRET, prepared.raid_id, match_id, &[]).unwrap();
        let outcomes = vec![CommitOutcome {
            character_id: character,
            status: OutcomeStatus::Died,
            provisional_loot: vec![],
            lost_iids: vec![],
            durability_updates: vec![],
            gold_gained: 0,
            xp_gained: 0,
        }];
        let signature = sign_commit(prepared.raid_id, match_id, &outcomes, SECRET);
        raids
            .commit(SECRET, prepared.raid_id, match_id, &outcomes, &signature)
            .unwrap();
        let owner = inventory.character(character).unwrap();
        assert!(!owner.items.contains_key(&rifle));
        assert!(owner.items.contains_key(&armor));
        assert!(owner.items[&armor].is_unlocked());
    }
    #[test]
    fn cancel_releases_locks_before_start() {
        let f = fixture();
        let prepared = f
            .raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        f.raids.cancel(f.character, prepared.raid_id).unwrap();
        let owner = f.inventory.character(f.character).unwrap();
        assert!(owner.items[&f.rifle].is_unlocked());
        assert!(f.raids.raid(prepared.raid_id).is_none());
        // and the character can prepare again
        assert!(
            f.raids
                .prepare(f.character, None, loadout(f.rifle, f.armor))
                .is_ok()
        );
    }
    #[test]
    fn expired_raids_are_swept_and_unlocked() {
        let f = fixture();
        let prepared = f
            .raids
            .prepare(f.character, None, loadout(f.rifle, f.armor))
            .unwrap();
        assert_eq!(f.raids.sweep(prepared.expires_at + 1), 1);
        assert!(f.raids.raid(prepared.raid_id).is_none());
        let owner = f.inventory.character(f.character).unwrap();
        assert!(owner.items[&f.rifle].is_unlocked());
    }
    #[test]
    fn cancel_is_owner_only_and_preparing_only() {
        let f = fixture();
        let stranger = f.inventory.register_character("acct-2", "Scav", 10, 10).id;
        let (raid_id, _) = active_raid(&f);
        assert_eq!(
            f.raids.cancel(stranger, raid_id).err(),
            Some(RaidError::NotYourRaid)
        );
        assert_eq!(
            f.raids.cancel(f.character, raid_id).err(),
            Some(RaidError::RaidNotPreparing)
        );
    }
    #[test]
    fn loadout_view_materializes_locked_items() {
        let f = fixture();
        let (raid_id, _) = active_raid(&f);
        let view = f.raids.loadout(SECRET, raid_id, f.character).unwrap();
        assert_eq!(view.items.len(), 2);
        assert!(view.items.iter().all(|i| i.in_raid()));
    }
}
