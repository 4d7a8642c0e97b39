use serde::Serialize;
use zsb_core::ID;
use zsb_core::PlayerId;
use zsb_core::UnixMillis;
use zsb_core::Wave;

/// Match lifecycle state. Ended is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Ended,
}

/// A match hosted on a tracked server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: ID<Match>,
    pub server_id: ID<crate::Server>,
    pub game_mode: String,
    pub status: MatchStatus,
    pub players: Vec<PlayerId>,
    pub wave: Wave,
    pub created_at: UnixMillis,
}

impl Match {
    pub fn new(server_id: ID<crate::Server>, game_mode: &str) -> Self {
        Self {
            id: ID::default(),
            server_id,
            game_mode: game_mode.to_string(),
            status: MatchStatus::Waiting,
            players: Vec::new(),
            wave: 0,
            created_at: zsb_core::now_millis(),
        }
    }
    pub fn is_ended(&self) -> bool {
        self.status == MatchStatus::Ended
    }
    pub fn has_player(&self, player: &str) -> bool {
        self.players.iter().any(|p| p == player)
    }
}
