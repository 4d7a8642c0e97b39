//! Request shapes for every route. Clients send heterogeneous JSON;
//! everything is parsed into these typed structs at the handler boundary
//! and validated there; untyped maps never travel further.
use serde::Deserialize;
use zsb_core::Gold;
use zsb_core::Port;
use zsb_core::StackCount;
use zsb_raid::CommitOutcome;
use zsb_raid::Loadout;
use zsb_social::InviteServerInfo;

fn default_game_mode() -> String {
    "survival".to_string()
}
fn default_lobby_size() -> usize {
    4
}
fn default_duration_hours() -> u64 {
    24
}
fn default_quantity() -> StackCount {
    1
}

// ---------------------------------------------------------------------------
// Server lifecycle
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerReady {
    pub port: Port,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHeartbeat {
    pub server_id: String,
    #[serde(default)]
    pub player_count: usize,
}

// ---------------------------------------------------------------------------
// Matchmaking and match events
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatch {
    pub player_id: String,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayer {
    pub match_id: String,
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveComplete {
    pub match_id: String,
    pub wave_number: zsb_core::Wave,
    #[serde(default)]
    pub zombies_killed: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEnd {
    pub match_id: String,
    #[serde(default = "default_end_reason")]
    pub reason: String,
    #[serde(default)]
    pub final_wave: zsb_core::Wave,
}

fn default_end_reason() -> String {
    "ended".to_string()
}

// ---------------------------------------------------------------------------
// Friends
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendPair {
    pub player_id: String,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub player_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub online: bool,
    #[serde(default)]
    pub current_game: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOnly {
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInvite {
    pub from_id: String,
    pub to_id: String,
    pub server: InviteServerInfo,
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyCreate {
    pub player_id: String,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
    #[serde(default = "default_lobby_size")]
    pub max_players: usize,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyJoin {
    pub player_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyReady {
    pub player_id: String,
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyStart {
    pub player_id: String,
    pub lobby_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyStatus {
    pub lobby_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpawn {
    pub lobby_id: String,
    pub player_id: String,
}

// ---------------------------------------------------------------------------
// Character / inventory
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterGet {
    pub character_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItem {
    pub character_id: String,
    pub op_id: String,
    pub iid: String,
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub rotation: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitStack {
    pub character_id: String,
    pub op_id: String,
    pub iid: String,
    pub amount: StackCount,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardItem {
    pub character_id: String,
    pub op_id: String,
    pub iid: String,
}

// ---------------------------------------------------------------------------
// Raid
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidPrepare {
    pub character_id: String,
    #[serde(default)]
    pub lobby_id: Option<String>,
    pub loadout: Loadout,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidCancel {
    pub character_id: String,
    pub raid_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidStart {
    pub server_secret: String,
    pub raid_id: String,
    pub match_id: String,
    #[serde(default)]
    pub player_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidLoadout {
    pub server_secret: String,
    pub raid_id: String,
    pub character_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidCommit {
    pub server_secret: String,
    pub raid_id: String,
    pub match_id: String,
    pub outcomes: Vec<CommitOutcome>,
    pub signature: String,
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketList {
    pub character_id: String,
    pub op_id: String,
    pub iid: String,
    pub price: Gold,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCancel {
    pub character_id: String,
    pub listing_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBuy {
    pub character_id: String,
    pub op_id: String,
    pub listing_id: String,
}

// ---------------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderOffers {
    pub trader_id: String,
    pub character_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderBuy {
    pub character_id: String,
    pub op_id: String,
    pub trader_id: String,
    pub offer_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: StackCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderSell {
    pub character_id: String,
    pub op_id: String,
    pub trader_id: String,
    pub iid: String,
    #[serde(default = "default_quantity")]
    pub quantity: StackCount,
}
