use serde::Serialize;
use zsb_core::ID;
use zsb_core::Port;
use zsb_core::UnixMillis;

/// Match-server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Process launched, waiting for its ready callback.
    Starting,
    /// Initialized and accepting a match.
    Ready,
    /// Hosting a match with spare capacity.
    InGame,
    /// Hosting a match at player capacity.
    Full,
    /// Termination requested, process winding down.
    Stopping,
    /// Process exited.
    Stopped,
    /// Process failed to start or crashed unexpectedly.
    Error,
}

impl ServerStatus {
    /// Whether the server still owns its port.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Stopped | Self::Error)
    }
}

/// A tracked match-server instance.
/// The registry holds the authoritative copy; the orchestrator owns the
/// OS child handle and mirrors only the pid here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: ID<Server>,
    pub port: Port,
    pub status: ServerStatus,
    pub current_players: usize,
    pub max_players: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<ID<crate::Match>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub last_heartbeat: UnixMillis,
    pub created_at: UnixMillis,
}

impl Server {
    pub fn new(port: Port, max_players: usize, pid: Option<u32>) -> Self {
        let now = zsb_core::now_millis();
        Self {
            id: ID::default(),
            port,
            status: ServerStatus::Starting,
            current_players: 0,
            max_players,
            match_id: None,
            pid,
            last_heartbeat: now,
            created_at: now,
        }
    }
    /// Room for at least one more player. An InGame server with spare
    /// slots still takes quick-play joins; only Full stops them.
    pub fn has_capacity(&self) -> bool {
        matches!(self.status, ServerStatus::Ready | ServerStatus::InGame)
            && self.current_players < self.max_players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn fresh_server_is_starting() {
        let server = Server::new(27015, 8, None);
        assert_eq!(server.status, ServerStatus::Starting);
        assert!(!server.has_capacity());
    }
    #[test]
    fn terminal_statuses_release_the_port() {
        assert!(ServerStatus::Starting.is_live());
        assert!(ServerStatus::Stopping.is_live());
        assert!(!ServerStatus::Stopped.is_live());
        assert!(!ServerStatus::Error.is_live());
    }
}
