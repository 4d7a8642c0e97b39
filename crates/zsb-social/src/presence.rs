use serde::Deserialize;
use serde::Serialize;
use zsb_core::PlayerId;
use zsb_core::Port;
use zsb_core::UnixMillis;

/// A player's live presence record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub player_id: PlayerId,
    pub display_name: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_game: Option<String>,
    pub last_seen: UnixMillis,
}

impl Presence {
    /// Minimal record for a player we have never seen announce itself.
    pub fn unknown(player_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            display_name: player_id.to_string(),
            online: false,
            current_game: None,
            last_seen: zsb_core::now_millis(),
        }
    }
}

/// A pending friend request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub from: PlayerId,
    pub to: PlayerId,
    pub sent_at: UnixMillis,
}

/// Where an inviting friend is playing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteServerInfo {
    pub host: String,
    pub port: Port,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
}

/// A game invite, culled after its TTL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInvite {
    pub from: PlayerId,
    pub server: InviteServerInfo,
    pub sent_at: UnixMillis,
}

impl GameInvite {
    pub fn is_stale(&self, now: UnixMillis) -> bool {
        now.saturating_sub(self.sent_at) > zsb_core::INVITE_TTL.as_millis() as UnixMillis
    }
}
