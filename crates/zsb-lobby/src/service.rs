use super::*;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::LOBBY_IDLE_TTL;
use zsb_core::PlayerId;
use zsb_core::Port;
use zsb_core::UnixMillis;

/// Lobby failure taxonomy. Kinds are stable wire tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    LobbyNotFound,
    LobbyNotWaiting,
    LobbyFull,
    NotLeader,
    NotInLobby,
    PlayersNotReady,
}

impl LobbyError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LobbyNotFound => "lobby_not_found",
            Self::LobbyNotWaiting => "lobby_not_waiting",
            Self::LobbyFull => "lobby_full",
            Self::NotLeader => "not_leader",
            Self::NotInLobby => "invalid_request",
            Self::PlayersNotReady => "players_not_ready",
        }
    }
}

impl std::fmt::Display for LobbyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl std::error::Error for LobbyError {}

#[derive(Default)]
struct State {
    lobbies: HashMap<String, Lobby>,
    by_player: HashMap<PlayerId, String>,
}

/// Code-addressed lobbies with leader/ready/start semantics. A player
/// belongs to at most one live lobby; joining another silently leaves
/// the first.
#[derive(Default)]
pub struct LobbyService {
    state: Mutex<State>,
}

impl LobbyService {
    pub fn new() -> Self {
        Self::default()
    }
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("lobby lock")
    }
    pub fn get(&self, code: &str) -> Option<Lobby> {
        self.lock().lobbies.get(code).cloned()
    }
    pub fn lobby_of(&self, player: &str) -> Option<Lobby> {
        let state = self.lock();
        state
            .by_player
            .get(player)
            .and_then(|code| state.lobbies.get(code))
            .cloned()
    }
    pub fn list(&self) -> Vec<Lobby> {
        let mut lobbies: Vec<Lobby> = self.lock().lobbies.values().cloned().collect();
        lobbies.sort_by_key(|l| l.created_at);
        lobbies
    }
}

impl LobbyService {
    /// Creates a lobby with the creator at spawn index 0. A creator in
    /// some other lobby leaves it first.
    pub fn create(
        &self,
        leader: &str,
        game_mode: &str,
        max_players: usize,
        name: Option<String>,
    ) -> Lobby {
        let mut state = self.lock();
        Self::detach(&mut state, leader);
        let mut code = generate_code();
        while state.lobbies.contains_key(&code) {
            code = generate_code();
        }
        let lobby = Lobby::new(&code, leader, game_mode, max_players, name);
        state.by_player.insert(leader.to_string(), code.clone());
        state.lobbies.insert(code, lobby.clone());
        log::info!("[lobby] {} created {}", leader, lobby.code);
        lobby
    }

    /// Prefix-tolerant join: the exact code wins, otherwise the first
    /// lobby whose code starts with the input. Safe because codes are
    /// sparse; kept because codes get read over voice chat.
    pub fn join(&self, code_input: &str, player: &str) -> Result<Lobby, LobbyError> {
        let mut state = self.lock();
        let input = code_input.trim().to_uppercase();
        let code = if state.lobbies.contains_key(&input) {
            input
        } else {
            let mut candidates: Vec<&String> = state
                .lobbies
                .keys()
                .filter(|c| !input.is_empty() && c.starts_with(&input))
                .collect();
            candidates.sort();
            candidates
                .first()
                .map(|c| c.to_string())
                .ok_or(LobbyError::LobbyNotFound)?
        };
        {
            let lobby = state.lobbies.get(&code).ok_or(LobbyError::LobbyNotFound)?;
            if lobby.state != LobbyState::Waiting {
                return Err(LobbyError::LobbyNotWaiting);
            }
            if lobby.has_player(player) {
                return Ok(lobby.clone());
            }
            if lobby.is_full() {
                return Err(LobbyError::LobbyFull);
            }
        }
        Self::detach(&mut state, player);
        let lobby = state.lobbies.get_mut(&code).ok_or(LobbyError::LobbyNotFound)?;
        lobby.players.push(LobbyPlayer {
            id: player.to_string(),
            ready: false,
        });
        state.by_player.insert(player.to_string(), code.clone());
        log::info!("[lobby] {} joined {}", player, code);
        Ok(state.lobbies.get(&code).cloned().expect("inserted above"))
    }

    /// Removes the player, collapses spawn indices, promotes a new leader
    /// if needed, and deletes the lobby once empty.
    pub fn leave(&self, player: &str) -> Option<Lobby> {
        let mut state = self.lock();
        Self::detach(&mut state, player)
    }

    pub fn set_ready(&self, player: &str, ready: bool) -> Result<Lobby, LobbyError> {
        let mut state = self.lock();
        let code = state
            .by_player
            .get(player)
            .cloned()
            .ok_or(LobbyError::NotInLobby)?;
        let lobby = state.lobbies.get_mut(&code).ok_or(LobbyError::LobbyNotFound)?;
        match lobby.players.iter_mut().find(|p| p.id == player) {
            Some(entry) => entry.ready = ready,
            None => return Err(LobbyError::NotInLobby),
        }
        Ok(lobby.clone())
    }

    /// Leader-only: Waiting → Starting once every non-leader is ready.
    /// Server/match attachment happens separately once the placement is
    /// known.
    pub fn start(&self, leader: &str, code: &str) -> Result<Lobby, LobbyError> {
        let mut state = self.lock();
        let lobby = state.lobbies.get_mut(code).ok_or(LobbyError::LobbyNotFound)?;
        if lobby.leader != leader {
            return Err(LobbyError::NotLeader);
        }
        if lobby.state != LobbyState::Waiting {
            return Err(LobbyError::LobbyNotWaiting);
        }
        if !lobby.all_ready() {
            return Err(LobbyError::PlayersNotReady);
        }
        lobby.state = LobbyState::Starting;
        log::info!("[lobby] {} starting", code);
        Ok(lobby.clone())
    }

    /// Puts a Starting lobby back to Waiting after a failed placement.
    pub fn revert_start(&self, code: &str) {
        if let Some(lobby) = self.lock().lobbies.get_mut(code) {
            if lobby.state == LobbyState::Starting {
                lobby.state = LobbyState::Waiting;
                log::warn!("[lobby] {} reverted to waiting", code);
            }
        }
    }

    /// Attaches the placed server once matchmaking finishes.
    pub fn assign_server(
        &self,
        code: &str,
        host: &str,
        port: Port,
        server_id: &str,
        match_id: &str,
    ) -> Result<Lobby, LobbyError> {
        let mut state = self.lock();
        let lobby = state.lobbies.get_mut(code).ok_or(LobbyError::LobbyNotFound)?;
        lobby.server = Some(AssignedServer {
            host: host.to_string(),
            port,
            server_id: server_id.to_string(),
            match_id: match_id.to_string(),
        });
        Ok(lobby.clone())
    }

    /// The authoritative spawn assignment. First claim flips the lobby to
    /// InGame; the match server calls this instead of trusting clients.
    pub fn claim_spawn(&self, code: &str, player: &str) -> Result<SpawnClaim, LobbyError> {
        let mut state = self.lock();
        let lobby = state.lobbies.get_mut(code).ok_or(LobbyError::LobbyNotFound)?;
        let spawn_index = lobby.spawn_index(player).ok_or(LobbyError::NotInLobby)?;
        if lobby.state == LobbyState::Starting {
            lobby.state = LobbyState::InGame;
        }
        Ok(SpawnClaim {
            player_id: player.to_string(),
            group_name: lobby.name.clone(),
            spawn_index,
            lobby_id: lobby.code.clone(),
        })
    }

    /// Removes lobbies older than the idle TTL that never reached InGame.
    pub fn cleanup_stale(&self) -> usize {
        self.sweep(zsb_core::now_millis())
    }
    fn sweep(&self, now: UnixMillis) -> usize {
        let mut state = self.lock();
        let ttl = LOBBY_IDLE_TTL.as_millis() as UnixMillis;
        let stale: Vec<String> = state
            .lobbies
            .values()
            .filter(|l| l.state != LobbyState::InGame && now.saturating_sub(l.created_at) > ttl)
            .map(|l| l.code.clone())
            .collect();
        for code in &stale {
            if let Some(lobby) = state.lobbies.remove(code) {
                for p in &lobby.players {
                    if state.by_player.get(&p.id) == Some(code) {
                        state.by_player.remove(&p.id);
                    }
                }
                log::info!("[lobby] {} removed as stale", code);
            }
        }
        stale.len()
    }

    /// Pulls a player out of whatever lobby they are in, keeping spawn
    /// indices dense and the leadership occupied. Returns the updated
    /// lobby, or None when the player was in none (or it emptied out).
    fn detach(state: &mut State, player: &str) -> Option<Lobby> {
        let code = state.by_player.remove(player)?;
        let lobby = state.lobbies.get_mut(&code)?;
        lobby.players.retain(|p| p.id != player);
        if lobby.players.is_empty() {
            state.lobbies.remove(&code);
            log::info!("[lobby] {} emptied and removed", code);
            return None;
        }
        if lobby.leader == player {
            lobby.leader = lobby.players[0].id.clone();
            log::info!("[lobby] {} promoted to lead {}", lobby.leader, code);
        }
        Some(lobby.clone())
    }
}
