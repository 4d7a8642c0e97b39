use serde::Serialize;
use zsb_core::LOBBY_MAX_PLAYERS;
use zsb_core::PlayerId;
use zsb_core::Port;
use zsb_core::SpawnIndex;
use zsb_core::UnixMillis;

/// Lobby lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyState {
    Waiting,
    Starting,
    InGame,
}

/// A roster entry. The entry's position in the roster is its spawn index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub ready: bool,
}

/// The server a started lobby was placed on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedServer {
    pub host: String,
    pub port: Port,
    pub server_id: String,
    pub match_id: String,
}

/// A code-addressed pre-match grouping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub code: String,
    pub name: String,
    pub leader: PlayerId,
    pub game_mode: String,
    pub max_players: usize,
    pub state: LobbyState,
    pub players: Vec<LobbyPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<AssignedServer>,
    pub created_at: UnixMillis,
}

impl Lobby {
    pub fn new(code: &str, leader: &str, game_mode: &str, max_players: usize, name: Option<String>) -> Self {
        Self {
            code: code.to_string(),
            name: name.unwrap_or_else(|| code.to_string()),
            leader: leader.to_string(),
            game_mode: game_mode.to_string(),
            max_players: max_players.clamp(1, LOBBY_MAX_PLAYERS),
            state: LobbyState::Waiting,
            players: vec![LobbyPlayer {
                id: leader.to_string(),
                ready: false,
            }],
            server: None,
            created_at: zsb_core::now_millis(),
        }
    }
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }
    pub fn spawn_index(&self, player: &str) -> Option<SpawnIndex> {
        self.players.iter().position(|p| p.id == player)
    }
    pub fn has_player(&self, player: &str) -> bool {
        self.spawn_index(player).is_some()
    }
    /// The leader counts as ready; everyone else must have toggled.
    pub fn all_ready(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.id != self.leader)
            .all(|p| p.ready)
    }
}

/// The authoritative spawn assignment handed to the match server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnClaim {
    pub player_id: PlayerId,
    pub group_name: String,
    pub spawn_index: SpawnIndex,
    pub lobby_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn creator_sits_at_spawn_zero() {
        let lobby = Lobby::new("ABCDEFGH", "p1", "survival", 4, None);
        assert_eq!(lobby.spawn_index("p1"), Some(0));
        assert_eq!(lobby.state, LobbyState::Waiting);
        assert_eq!(lobby.name, "ABCDEFGH");
    }
    #[test]
    fn max_players_clamps_to_the_legal_range() {
        assert_eq!(Lobby::new("A", "p1", "survival", 0, None).max_players, 1);
        assert_eq!(Lobby::new("A", "p1", "survival", 99, None).max_players, 8);
    }
    #[test]
    fn leader_is_implicitly_ready() {
        let mut lobby = Lobby::new("ABCDEFGH", "p1", "survival", 4, None);
        lobby.players.push(LobbyPlayer {
            id: "p2".into(),
            ready: false,
        });
        assert!(!lobby.all_ready());
        lobby.players[1].ready = true;
        assert!(lobby.all_ready());
    }
}
