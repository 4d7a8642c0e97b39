use crate::config::Config;
use crate::seed::SeedData;
use std::sync::Arc;
use zsb_core::UnixMillis;
use zsb_discovery::DiscoveryService;
use zsb_inventory::Catalog;
use zsb_inventory::InventoryService;
use zsb_lobby::Lobby;
use zsb_lobby::LobbyService;
use zsb_market::MarketService;
use zsb_orchestrator::Orchestrator;
use zsb_orchestrator::OrchestratorConfig;
use zsb_raid::RaidService;
use zsb_registry::Match;
use zsb_registry::PortPool;
use zsb_registry::Server;
use zsb_registry::SessionRegistry;
use zsb_social::FriendDirectory;
use zsb_trader::TraderService;

/// Where a player was placed, or confirmed to already be.
#[derive(Debug, Clone)]
pub struct MatchPlacement {
    pub status: &'static str,
    pub game_match: Match,
    pub server_host: String,
    pub server_port: zsb_core::Port,
}

/// Result of a successful lobby start.
#[derive(Debug, Clone)]
pub struct LobbyStart {
    pub game_match: Match,
    pub server_host: String,
    pub server_port: zsb_core::Port,
    pub lobby: Lobby,
}

/// The one long-lived startup object. Owns every service and injects
/// them into handlers; nothing else holds global state.
pub struct Backend {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub ports: Arc<PortPool>,
    pub orchestrator: Arc<Orchestrator>,
    pub inventory: Arc<InventoryService>,
    pub raids: Arc<RaidService>,
    pub market: Arc<MarketService>,
    pub traders: Arc<TraderService>,
    pub friends: Arc<FriendDirectory>,
    pub lobbies: Arc<LobbyService>,
    pub discovery: Arc<DiscoveryService>,
    pub started_at: UnixMillis,
}

impl Backend {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let seed = match &config.seed_file {
            Some(path) => SeedData::from_file(path)?,
            None => SeedData::embedded(),
        };
        let registry = Arc::new(SessionRegistry::new());
        let ports = Arc::new(PortPool::new(config.port_base, config.port_count));
        let orchestrator = Arc::new(Orchestrator::new(
            OrchestratorConfig {
                server_bin: config.server_bin.clone(),
                server_args: config.server_args.clone(),
                backend_host: config.public_host.clone(),
                backend_port: config.backend_port,
                min_pool: config.min_pool,
                max_players: config.max_players,
            },
            registry.clone(),
            ports.clone(),
        ));
        let inventory = Arc::new(InventoryService::new(Arc::new(Catalog::new(
            seed.item_defs.clone(),
        ))));
        let characters = seed.seed_characters(&inventory);
        log::info!(
            "[backend] seeded {} item defs, {} traders, {} characters",
            seed.item_defs.len(),
            seed.traders.len(),
            characters.len()
        );
        let raids = Arc::new(RaidService::new(inventory.clone(), &config.server_secret));
        let market = Arc::new(MarketService::new(inventory.clone()));
        let traders = Arc::new(TraderService::new(inventory.clone(), seed.traders));
        let discovery = Arc::new(DiscoveryService::new(registry.clone(), &config.public_host));
        Ok(Arc::new(Self {
            registry,
            ports,
            orchestrator,
            inventory,
            raids,
            market,
            traders,
            friends: Arc::new(FriendDirectory::new()),
            lobbies: Arc::new(LobbyService::new()),
            discovery,
            started_at: zsb_core::now_millis(),
            config,
        }))
    }

    /// Launches the supervisory loop and the periodic sweeps.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        tokio::spawn(self.orchestrator.clone().run());
        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(zsb_core::MARKET_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                backend.market.expire_stale();
            }
        });
        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(zsb_core::RAID_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                backend.raids.cleanup_expired();
            }
        });
        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(zsb_core::LOBBY_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                backend.lobbies.cleanup_stale();
            }
        });
        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(zsb_core::TRADER_RESTOCK_INTERVAL);
            interval.tick().await; // the first tick fires immediately
            loop {
                interval.tick().await;
                backend.traders.restock_all();
            }
        });
    }

    /// A Ready server with capacity, spawning and waiting when the pool
    /// is dry. The spawn wait is the only blocking point in matchmaking.
    pub async fn acquire_server(&self) -> Result<Server, &'static str> {
        if let Some(server) = self.orchestrator.available_server() {
            return Ok(server);
        }
        let spawned = match self.orchestrator.spawn_server().await {
            Ok(server) => server,
            Err(e) => {
                log::error!("[backend] spawn for matchmaking failed: {}", e);
                return Err("no_servers_available");
            }
        };
        match self.orchestrator.wait_for_ready(spawned.id).await {
            Some(server) => Ok(server),
            None => {
                log::error!("[backend] server {} never became ready", spawned.id);
                Err("server_failed_to_start")
            }
        }
    }

    /// Quick play: an existing binding wins, otherwise place the player
    /// on a server, creating the match if the server has none.
    pub async fn find_match(
        &self,
        player: &str,
        game_mode: &str,
    ) -> Result<MatchPlacement, &'static str> {
        if let Some(existing) = self.registry.match_by_player(player) {
            let server = self
                .registry
                .server(existing.server_id)
                .ok_or("server_not_found")?;
            return Ok(MatchPlacement {
                status: "already_matched",
                game_match: existing,
                server_host: self.config.public_host.clone(),
                server_port: server.port,
            });
        }
        let server = self.acquire_server().await?;
        let game_match = match self.registry.match_by_server(server.id) {
            Some(m) if !m.is_ended() => m,
            _ => self
                .registry
                .create_match(server.id, game_mode)
                .map_err(|e| e.kind())?,
        };
        self.registry
            .add_player(game_match.id, player)
            .map_err(|e| e.kind())?;
        let game_match = self
            .registry
            .match_by_id(game_match.id)
            .ok_or("match_not_found")?;
        log::info!(
            "[backend] matched {} into {} on port {}",
            player,
            game_match.id,
            server.port
        );
        Ok(MatchPlacement {
            status: "matched",
            game_match,
            server_host: self.config.public_host.clone(),
            server_port: server.port,
        })
    }

    /// Lobby start: validate leadership/readiness, place the whole group
    /// on one server, bind every member to the match.
    pub async fn start_lobby(
        &self,
        leader: &str,
        lobby_id: &str,
    ) -> Result<LobbyStart, &'static str> {
        let lobby = self
            .lobbies
            .start(leader, lobby_id)
            .map_err(|e| e.kind())?;
        let server = match self.acquire_server().await {
            Ok(server) => server,
            Err(kind) => {
                self.lobbies.revert_start(lobby_id);
                return Err(kind);
            }
        };
        let game_match = match self.registry.create_match(server.id, &lobby.game_mode) {
            Ok(m) => m,
            Err(e) => {
                self.lobbies.revert_start(lobby_id);
                return Err(e.kind());
            }
        };
        for player in &lobby.players {
            if let Err(e) = self.registry.add_player(game_match.id, &player.id) {
                log::warn!("[backend] lobby bind failed for {}: {}", player.id, e);
            }
        }
        let lobby = self
            .lobbies
            .assign_server(
                lobby_id,
                &self.config.public_host,
                server.port,
                &server.id.to_string(),
                &game_match.id.to_string(),
            )
            .map_err(|e| e.kind())?;
        let game_match = self
            .registry
            .match_by_id(game_match.id)
            .ok_or("match_not_found")?;
        Ok(LobbyStart {
            game_match,
            server_host: self.config.public_host.clone(),
            server_port: server.port,
            lobby,
        })
    }

    pub fn uptime_millis(&self) -> UnixMillis {
        zsb_core::now_millis().saturating_sub(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsb_lobby::LobbyState;

    fn test_backend(server_bin: &str) -> Arc<Backend> {
        Backend::new(Config {
            bind_addr: "127.0.0.1:0".into(),
            public_host: "127.0.0.1".into(),
            backend_port: 8080,
            discovery_addr: "127.0.0.1:0".into(),
            server_bin: server_bin.into(),
            server_args: vec![],
            port_base: 27015,
            port_count: 8,
            min_pool: 0,
            max_players: 8,
            server_secret: "test-secret".into(),
            seed_file: None,
        })
        .unwrap()
    }

    fn ready_server(backend: &Backend) {
        backend.registry.register_server(27015, 8, None).unwrap();
        backend.registry.mark_ready_by_port(27015).unwrap();
    }

    #[tokio::test]
    async fn find_match_reuses_an_existing_binding() {
        let backend = test_backend("/bin/false");
        ready_server(&backend);
        let first = backend.find_match("p1", "survival").await.unwrap();
        assert_eq!(first.status, "matched");
        assert_eq!(first.server_port, 27015);
        let second = backend.find_match("p1", "survival").await.unwrap();
        assert_eq!(second.status, "already_matched");
        assert_eq!(first.game_match.id, second.game_match.id);
    }
    #[tokio::test]
    async fn two_players_share_one_match() {
        let backend = test_backend("/bin/false");
        ready_server(&backend);
        let a = backend.find_match("p1", "survival").await.unwrap();
        let b = backend.find_match("p2", "survival").await.unwrap();
        assert_eq!(a.game_match.id, b.game_match.id);
        assert_eq!(b.game_match.players.len(), 2);
    }
    #[tokio::test]
    async fn unspawnable_server_reports_unavailable() {
        let backend = test_backend("/nonexistent/match-server");
        assert_eq!(
            backend.find_match("p1", "survival").await.err(),
            Some("no_servers_available")
        );
    }
    #[tokio::test]
    async fn lobby_start_places_the_whole_group() {
        let backend = test_backend("/bin/false");
        ready_server(&backend);
        let lobby = backend.lobbies.create("p1", "survival", 4, None);
        backend.lobbies.join(&lobby.code, "p2").unwrap();
        backend.lobbies.join(&lobby.code, "p3").unwrap();
        backend.lobbies.set_ready("p2", true).unwrap();
        backend.lobbies.set_ready("p3", true).unwrap();
        let started = backend.start_lobby("p1", &lobby.code).await.unwrap();
        assert_eq!(started.lobby.state, LobbyState::Starting);
        assert_eq!(started.server_port, 27015);
        assert_eq!(started.game_match.players.len(), 3);
        assert!(started.lobby.server.is_some());
        let claim = backend.lobbies.claim_spawn(&lobby.code, "p2").unwrap();
        assert_eq!(claim.spawn_index, 1);
    }
    #[tokio::test]
    async fn failed_placement_reverts_the_lobby() {
        let backend = test_backend("/nonexistent/match-server");
        let lobby = backend.lobbies.create("p1", "survival", 4, None);
        assert!(backend.start_lobby("p1", &lobby.code).await.is_err());
        assert_eq!(
            backend.lobbies.get(&lobby.code).unwrap().state,
            LobbyState::Waiting
        );
    }
}
