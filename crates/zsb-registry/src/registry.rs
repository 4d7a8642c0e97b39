use super::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use zsb_core::ID;
use zsb_core::PlayerId;
use zsb_core::Port;

/// Errors surfaced by registry mutations. Kinds are stable wire tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    ServerNotFound,
    MatchNotFound,
    MatchEnded,
    PortInUse(Port),
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServerNotFound => "server_not_found",
            Self::MatchNotFound => "match_not_found",
            Self::MatchEnded => "match_not_found",
            Self::PortInUse(_) => "port_in_use",
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerNotFound => write!(f, "server not found"),
            Self::MatchNotFound => write!(f, "match not found"),
            Self::MatchEnded => write!(f, "match already ended"),
            Self::PortInUse(p) => write!(f, "port {} already registered", p),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Point-in-time counts for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub servers: usize,
    pub servers_starting: usize,
    pub servers_ready: usize,
    pub servers_in_game: usize,
    pub servers_full: usize,
    pub matches: usize,
    pub matches_active: usize,
    pub players_in_matches: usize,
}

#[derive(Default)]
struct Tables {
    servers: HashMap<ID<Server>, Server>,
    matches: HashMap<ID<Match>, Match>,
    by_port: HashMap<Port, ID<Server>>,
    by_player: HashMap<PlayerId, ID<Match>>,
    by_server: HashMap<ID<Server>, ID<Match>>,
}

/// Authoritative in-memory store of servers, matches, and player→match
/// bindings. Every mutation updates the primary table and its back-indexes
/// under one lock, so readers always observe a consistent entity.
#[derive(Default)]
pub struct SessionRegistry {
    tables: Mutex<Tables>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Server lifecycle.
impl SessionRegistry {
    /// Registers a Starting server. The port must not belong to a live entry.
    pub fn register_server(
        &self,
        port: Port,
        max_players: usize,
        pid: Option<u32>,
    ) -> Result<Server, RegistryError> {
        let mut t = self.lock();
        if let Some(prior) = t.by_port.get(&port) {
            if t.servers.get(prior).map(|s| s.status.is_live()) == Some(true) {
                return Err(RegistryError::PortInUse(port));
            }
        }
        let server = Server::new(port, max_players, pid);
        t.by_port.insert(port, server.id);
        t.servers.insert(server.id, server.clone());
        log::debug!("[registry] registered server {} on port {}", server.id, port);
        Ok(server)
    }
    /// Drops a server and all indexes pointing at it. Returns the final entry.
    pub fn unregister_server(&self, id: ID<Server>) -> Option<Server> {
        let mut t = self.lock();
        let server = t.servers.remove(&id)?;
        t.by_port.remove(&server.port);
        t.by_server.remove(&id);
        Some(server)
    }
    /// Transitions Starting→Ready by port. Returns the server id, or None
    /// when the port is unknown (the caller may register on the fly).
    pub fn mark_ready_by_port(&self, port: Port) -> Option<ID<Server>> {
        let mut t = self.lock();
        let id = t.by_port.get(&port).copied()?;
        let server = t.servers.get_mut(&id)?;
        server.status = ServerStatus::Ready;
        server.last_heartbeat = zsb_core::now_millis();
        log::info!("[registry] server {} on port {} is ready", id, port);
        Some(id)
    }
    /// Marks a server as winding down so it no longer matches queries.
    pub fn mark_stopping(&self, id: ID<Server>) {
        if let Some(server) = self.lock().servers.get_mut(&id) {
            server.status = ServerStatus::Stopping;
        }
    }
    /// Records a liveness report and reconciles Ready↔Full from capacity.
    pub fn heartbeat(&self, id: ID<Server>, player_count: usize) -> Result<(), RegistryError> {
        let mut t = self.lock();
        let server = t.servers.get_mut(&id).ok_or(RegistryError::ServerNotFound)?;
        server.last_heartbeat = zsb_core::now_millis();
        server.current_players = player_count;
        match server.status {
            ServerStatus::Ready if player_count >= server.max_players => {
                server.status = ServerStatus::Full;
            }
            ServerStatus::Full if player_count < server.max_players => {
                server.status = ServerStatus::Ready;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Match lifecycle.
impl SessionRegistry {
    /// Creates a match on a server and binds the server to it.
    pub fn create_match(
        &self,
        server_id: ID<Server>,
        game_mode: &str,
    ) -> Result<Match, RegistryError> {
        let mut t = self.lock();
        let server = t
            .servers
            .get_mut(&server_id)
            .ok_or(RegistryError::ServerNotFound)?;
        let m = Match::new(server_id, game_mode);
        server.match_id = Some(m.id);
        server.status = ServerStatus::InGame;
        t.by_server.insert(server_id, m.id);
        t.matches.insert(m.id, m.clone());
        log::info!("[registry] match {} created on server {}", m.id, server_id);
        Ok(m)
    }
    /// Adds a player to a match. A player already bound to a different
    /// non-Ended match is silently moved; re-adding to the same match is
    /// a no-op. Player↔match uniqueness holds at every return.
    pub fn add_player(&self, match_id: ID<Match>, player: &str) -> Result<(), RegistryError> {
        let mut t = self.lock();
        match t.matches.get(&match_id) {
            None => return Err(RegistryError::MatchNotFound),
            Some(m) if m.is_ended() => return Err(RegistryError::MatchEnded),
            Some(m) if m.has_player(player) => return Ok(()),
            Some(_) => {}
        }
        if let Some(prior) = t.by_player.get(player).copied() {
            if prior != match_id {
                log::warn!("[registry] moving player {} off match {}", player, prior);
                if let Some(m) = t.matches.get_mut(&prior) {
                    m.players.retain(|p| p != player);
                }
            }
        }
        let m = t.matches.get_mut(&match_id).expect("checked above");
        m.players.push(player.to_string());
        m.status = MatchStatus::InProgress;
        t.by_player.insert(player.to_string(), match_id);
        Ok(())
    }
    /// Removes a player from a match. Silent when absent.
    pub fn remove_player(&self, match_id: ID<Match>, player: &str) {
        let mut t = self.lock();
        if let Some(m) = t.matches.get_mut(&match_id) {
            m.players.retain(|p| p != player);
        }
        if t.by_player.get(player) == Some(&match_id) {
            t.by_player.remove(player);
        }
    }
    /// Records wave progress on an in-flight match.
    pub fn record_wave(&self, match_id: ID<Match>, wave: zsb_core::Wave) -> Result<(), RegistryError> {
        let mut t = self.lock();
        let m = t
            .matches
            .get_mut(&match_id)
            .ok_or(RegistryError::MatchNotFound)?;
        m.wave = wave;
        Ok(())
    }
    /// Ends a match: unbinds its players, releases the server back to Ready.
    pub fn end_match(&self, match_id: ID<Match>, reason: &str) -> Result<Match, RegistryError> {
        let mut t = self.lock();
        let m = t
            .matches
            .get_mut(&match_id)
            .ok_or(RegistryError::MatchNotFound)?;
        if m.is_ended() {
            return Err(RegistryError::MatchEnded);
        }
        m.status = MatchStatus::Ended;
        let ended = m.clone();
        for p in &ended.players {
            if t.by_player.get(p) == Some(&match_id) {
                t.by_player.remove(p);
            }
        }
        t.by_server.remove(&ended.server_id);
        if let Some(server) = t.servers.get_mut(&ended.server_id) {
            server.match_id = None;
            if matches!(server.status, ServerStatus::InGame | ServerStatus::Full) {
                server.status = ServerStatus::Ready;
            }
        }
        log::info!("[registry] match {} ended: {}", match_id, reason);
        Ok(ended)
    }
}

/// Queries. Each returns a clone so callers never hold the lock.
impl SessionRegistry {
    pub fn server(&self, id: ID<Server>) -> Option<Server> {
        self.lock().servers.get(&id).cloned()
    }
    pub fn server_by_port(&self, port: Port) -> Option<Server> {
        let t = self.lock();
        t.by_port.get(&port).and_then(|id| t.servers.get(id)).cloned()
    }
    pub fn match_by_id(&self, id: ID<Match>) -> Option<Match> {
        self.lock().matches.get(&id).cloned()
    }
    pub fn match_by_player(&self, player: &str) -> Option<Match> {
        let t = self.lock();
        t.by_player
            .get(player)
            .and_then(|id| t.matches.get(id))
            .filter(|m| !m.is_ended())
            .cloned()
    }
    pub fn match_by_server(&self, server_id: ID<Server>) -> Option<Match> {
        let t = self.lock();
        t.by_server
            .get(&server_id)
            .and_then(|id| t.matches.get(id))
            .cloned()
    }
    pub fn servers(&self) -> Vec<Server> {
        self.lock().servers.values().cloned().collect()
    }
    /// Ready servers with spare capacity, soonest-created first.
    pub fn available_servers(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self
            .lock()
            .servers
            .values()
            .filter(|s| s.has_capacity())
            .cloned()
            .collect();
        servers.sort_by_key(|s| s.created_at);
        servers
    }
    /// Servers in {Starting, Ready} counted against the minimum pool.
    pub fn pool_count(&self) -> usize {
        self.lock()
            .servers
            .values()
            .filter(|s| matches!(s.status, ServerStatus::Starting | ServerStatus::Ready))
            .count()
    }
    /// Servers whose liveness signal has lapsed. Heartbeating servers are
    /// judged by the heartbeat timeout; Starting servers get the longer
    /// boot window since they only report once initialized. Detection only:
    /// the orchestrator decides what to terminate.
    pub fn timed_out_servers(&self, heartbeat: Duration, boot: Duration) -> Vec<ID<Server>> {
        let now = zsb_core::now_millis();
        let lapsed = |since: zsb_core::UnixMillis, window: Duration| {
            now.saturating_sub(since) > window.as_millis() as u64
        };
        self.lock()
            .servers
            .values()
            .filter(|s| match s.status {
                ServerStatus::Ready | ServerStatus::InGame | ServerStatus::Full => {
                    lapsed(s.last_heartbeat, heartbeat)
                }
                ServerStatus::Starting => lapsed(s.created_at, boot),
                _ => false,
            })
            .map(|s| s.id)
            .collect()
    }
    pub fn stats(&self) -> RegistryStats {
        let t = self.lock();
        let count = |status: ServerStatus| t.servers.values().filter(|s| s.status == status).count();
        RegistryStats {
            servers: t.servers.len(),
            servers_starting: count(ServerStatus::Starting),
            servers_ready: count(ServerStatus::Ready),
            servers_in_game: count(ServerStatus::InGame),
            servers_full: count(ServerStatus::Full),
            matches: t.matches.len(),
            matches_active: t.matches.values().filter(|m| !m.is_ended()).count(),
            players_in_matches: t.by_player.len(),
        }
    }
}

impl SessionRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("registry lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsb_core::HEARTBEAT_TIMEOUT;

    fn ready_server(registry: &SessionRegistry, port: Port) -> Server {
        let server = registry.register_server(port, 8, None).unwrap();
        registry.mark_ready_by_port(port).unwrap();
        registry.server(server.id).unwrap()
    }

    #[test]
    fn port_is_unique_among_live_servers() {
        let registry = SessionRegistry::new();
        let first = registry.register_server(27015, 8, None).unwrap();
        assert_eq!(
            registry.register_server(27015, 8, None),
            Err(RegistryError::PortInUse(27015))
        );
        registry.unregister_server(first.id);
        assert!(registry.register_server(27015, 8, None).is_ok());
    }
    #[test]
    fn ready_by_unknown_port_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry.mark_ready_by_port(27015).is_none());
    }
    #[test]
    fn heartbeat_flips_ready_and_full() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        registry.heartbeat(server.id, 8).unwrap();
        assert_eq!(registry.server(server.id).unwrap().status, ServerStatus::Full);
        registry.heartbeat(server.id, 3).unwrap();
        assert_eq!(registry.server(server.id).unwrap().status, ServerStatus::Ready);
    }
    #[test]
    fn player_binds_to_at_most_one_live_match() {
        let registry = SessionRegistry::new();
        let s1 = ready_server(&registry, 27015);
        let s2 = ready_server(&registry, 27016);
        let m1 = registry.create_match(s1.id, "survival").unwrap();
        let m2 = registry.create_match(s2.id, "survival").unwrap();
        registry.add_player(m1.id, "p1").unwrap();
        registry.add_player(m2.id, "p1").unwrap();
        assert!(!registry.match_by_id(m1.id).unwrap().has_player("p1"));
        assert_eq!(registry.match_by_player("p1").unwrap().id, m2.id);
    }
    #[test]
    fn readding_player_is_noop() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        let m = registry.create_match(server.id, "survival").unwrap();
        registry.add_player(m.id, "p1").unwrap();
        registry.add_player(m.id, "p1").unwrap();
        assert_eq!(registry.match_by_id(m.id).unwrap().players.len(), 1);
    }
    #[test]
    fn end_match_unbinds_players_and_frees_server() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        let m = registry.create_match(server.id, "survival").unwrap();
        registry.add_player(m.id, "p1").unwrap();
        registry.end_match(m.id, "final_wave").unwrap();
        assert!(registry.match_by_player("p1").is_none());
        let server = registry.server(server.id).unwrap();
        assert_eq!(server.status, ServerStatus::Ready);
        assert!(server.match_id.is_none());
        assert_eq!(
            registry.end_match(m.id, "again"),
            Err(RegistryError::MatchEnded)
        );
    }
    #[test]
    fn remove_player_is_silent_when_absent() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        let m = registry.create_match(server.id, "survival").unwrap();
        registry.remove_player(m.id, "ghost");
        assert!(registry.match_by_id(m.id).unwrap().players.is_empty());
    }
    #[test]
    fn starting_servers_use_the_boot_window() {
        let registry = SessionRegistry::new();
        let starting = registry.register_server(27015, 8, None).unwrap();
        let timed_out =
            registry.timed_out_servers(HEARTBEAT_TIMEOUT, std::time::Duration::from_secs(30));
        assert!(!timed_out.contains(&starting.id));
        let timed_out =
            registry.timed_out_servers(HEARTBEAT_TIMEOUT, std::time::Duration::ZERO);
        assert!(timed_out.contains(&starting.id));
    }
    #[test]
    fn stale_heartbeat_is_reported_not_unregistered() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        let timed_out = registry.timed_out_servers(std::time::Duration::ZERO, HEARTBEAT_TIMEOUT);
        assert!(timed_out.contains(&server.id));
        assert!(registry.server(server.id).is_some());
    }
    #[test]
    fn available_servers_excludes_full_and_starting() {
        let registry = SessionRegistry::new();
        registry.register_server(27015, 8, None).unwrap();
        let ready = ready_server(&registry, 27016);
        let full = ready_server(&registry, 27017);
        registry.heartbeat(full.id, 8).unwrap();
        let available = registry.available_servers();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, ready.id);
    }
    #[test]
    fn stats_snapshot_counts() {
        let registry = SessionRegistry::new();
        let server = ready_server(&registry, 27015);
        let m = registry.create_match(server.id, "survival").unwrap();
        registry.add_player(m.id, "p1").unwrap();
        let stats = registry.stats();
        assert_eq!(stats.servers, 1);
        assert_eq!(stats.servers_in_game, 1);
        assert_eq!(stats.matches_active, 1);
        assert_eq!(stats.players_in_matches, 1);
    }
}
