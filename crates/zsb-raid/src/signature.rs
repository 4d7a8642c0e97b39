use super::*;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_inventory::Character;
use zsb_inventory::DurabilityUpdate;
use zsb_inventory::ItemInstance;
use zsb_inventory::LootSpec;

/// How one character left the raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Extracted,
    Died,
}

/// One character's result inside a commit envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub character_id: ID<Character>,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub provisional_loot: Vec<LootSpec>,
    #[serde(default)]
    pub lost_iids: Vec<ID<ItemInstance>>,
    #[serde(default)]
    pub durability_updates: Vec<DurabilityUpdate>,
    #[serde(default)]
    pub gold_gained: Gold,
    #[serde(default)]
    pub xp_gained: u64,
}

/// Canonical signing payload. Only the listed fields participate, in this
/// exact declaration order; extending the outcome shape means extending
/// this struct first or the serialization will drift between peers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPayload<'a> {
    raid_id: &'a str,
    match_id: &'a str,
    outcomes: Vec<CanonicalOutcome>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalOutcome {
    character_id: String,
    status: OutcomeStatus,
    loot_count: usize,
    lost_count: usize,
}

/// Signature over the canonical commit payload:
/// `lowerhex(sha256(canonicalJson ∥ serverSecret))`. Deterministic: two
/// signatures of the same payload are byte-equal.
pub fn sign_commit(
    raid_id: ID<RaidSession>,
    match_id: ID<MatchRef>,
    outcomes: &[CommitOutcome],
    secret: &str,
) -> String {
    let raid_id = raid_id.to_string();
    let match_id = match_id.to_string();
    let payload = CanonicalPayload {
        raid_id: &raid_id,
        match_id: &match_id,
        outcomes: outcomes
            .iter()
            .map(|o| CanonicalOutcome {
                character_id: o.character_id.to_string(),
                status: o.status,
                loot_count: o.provisional_loot.len(),
                lost_count: o.lost_iids.len(),
            })
            .collect(),
    };
    let canonical = serde_json::to_string(&payload).expect("serialize canonical payload");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}
