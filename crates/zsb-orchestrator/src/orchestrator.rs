use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use zsb_core::ID;
use zsb_core::ORCHESTRATOR_TICK;
use zsb_core::Port;
use zsb_core::SHUTDOWN_GRACE;
use zsb_core::SPAWN_WAIT_INTERVAL;
use zsb_core::SPAWN_WAIT_POLLS;
use zsb_registry::PortPool;
use zsb_registry::Server;
use zsb_registry::ServerStatus;
use zsb_registry::SessionRegistry;

/// How match-server children are launched and where they call back.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Path to the match-server executable.
    pub server_bin: PathBuf,
    /// Arguments passed verbatim; `--headless` plus an optional project path.
    pub server_args: Vec<String>,
    /// Host the child should reach the backend HTTP API on.
    pub backend_host: String,
    /// Port the child should reach the backend HTTP API on.
    pub backend_port: Port,
    /// Minimum count of servers kept in {Starting, Ready}.
    pub min_pool: usize,
    /// Player capacity registered for each spawned server.
    pub max_players: usize,
}

/// Spawns, monitors, and terminates match-server processes.
///
/// A crashed child is not fatal: the supervisory loop observes the exit,
/// tears the registry entry down, and the top-up step replaces it. A spawn
/// failure is logged and retried on the next tick.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<SessionRegistry>,
    ports: Arc<PortPool>,
    children: Mutex<HashMap<ID<Server>, Child>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<SessionRegistry>,
        ports: Arc<PortPool>,
    ) -> Self {
        Self {
            config,
            registry,
            ports,
            children: Mutex::new(HashMap::new()),
        }
    }
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

/// Spawning.
impl Orchestrator {
    /// Launches one match server on a freshly allocated port and registers
    /// it as Starting. The entry stays Starting until the child POSTs
    /// `/servers/ready`.
    pub async fn spawn_server(&self) -> anyhow::Result<Server> {
        let port = self.ports.allocate()?;
        let child = Command::new(&self.config.server_bin)
            .args(&self.config.server_args)
            .env("GAME_PORT", port.to_string())
            .env("BACKEND_HOST", &self.config.backend_host)
            .env("BACKEND_PORT", self.config.backend_port.to_string())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.ports.release(port);
                anyhow::bail!("failed to spawn {}: {}", self.config.server_bin.display(), e);
            }
        };
        let server = match self
            .registry
            .register_server(port, self.config.max_players, child.id())
        {
            Ok(server) => server,
            Err(e) => {
                self.ports.release(port);
                anyhow::bail!("failed to register spawned server: {}", e);
            }
        };
        self.children.lock().await.insert(server.id, child);
        log::info!(
            "[orchestrator] spawned server {} on port {} (pid {:?})",
            server.id,
            port,
            server.pid
        );
        Ok(server)
    }
    /// Any Ready server with capacity, or None.
    pub fn available_server(&self) -> Option<Server> {
        self.registry.available_servers().into_iter().next()
    }
    /// Polls until a server reports Ready, up to the spawn-wait window.
    pub async fn wait_for_ready(&self, id: ID<Server>) -> Option<Server> {
        for _ in 0..SPAWN_WAIT_POLLS {
            match self.registry.server(id) {
                Some(s) if s.status == ServerStatus::Ready => return Some(s),
                Some(_) => tokio::time::sleep(SPAWN_WAIT_INTERVAL).await,
                None => return None,
            }
        }
        None
    }
}

/// Termination.
impl Orchestrator {
    /// Gracefully stops a server, force-killing after the grace period,
    /// then ends its match, releases its port, and unregisters it.
    pub async fn terminate_server(&self, id: ID<Server>, reason: &str) {
        self.registry.mark_stopping(id);
        if let Some(child) = self.children.lock().await.remove(&id) {
            self.stop_child(child).await;
        }
        self.teardown(id, reason);
    }
    /// Graceful first (SIGTERM on unix), forced after the grace period.
    async fn stop_child(&self, mut child: Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        let _ = child.start_kill();
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = child.kill().await;
            }
        }
    }
    /// Registry/port cleanup shared by every termination path.
    fn teardown(&self, id: ID<Server>, reason: &str) {
        if let Some(m) = self.registry.match_by_server(id) {
            let _ = self.registry.end_match(m.id, reason);
        }
        if let Some(server) = self.registry.unregister_server(id) {
            self.ports.release(server.port);
            log::info!(
                "[orchestrator] server {} terminated ({}), port {} released",
                id,
                reason,
                server.port
            );
        }
    }
    /// Terminates every tracked child and releases every port.
    pub async fn shutdown(&self) {
        let ids: Vec<ID<Server>> = self.children.lock().await.keys().copied().collect();
        for id in ids {
            self.terminate_server(id, "backend_shutdown").await;
        }
    }
}

/// Supervision.
impl Orchestrator {
    /// One supervisory pass: heartbeat sweep, exit sweep, pool top-up.
    pub async fn tick(&self) {
        self.sweep_heartbeats().await;
        self.sweep_exits().await;
        self.top_up().await;
    }
    /// Runs the supervisory loop forever. Spawn this once at startup.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(ORCHESTRATOR_TICK);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
    async fn sweep_heartbeats(&self) {
        let boot = SPAWN_WAIT_INTERVAL * SPAWN_WAIT_POLLS as u32;
        for id in self
            .registry
            .timed_out_servers(zsb_core::HEARTBEAT_TIMEOUT, boot)
        {
            log::warn!("[orchestrator] server {} missed heartbeats", id);
            self.terminate_server(id, "heartbeat_timeout").await;
        }
    }
    /// Reaps exited children and tears down their registry entries with
    /// reason `process_exit_<code>`.
    async fn sweep_exits(&self) {
        let mut exited = Vec::new();
        {
            let mut children = self.children.lock().await;
            for (id, child) in children.iter_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    exited.push((*id, status.code().unwrap_or(-1)));
                }
            }
            for (id, _) in &exited {
                children.remove(id);
            }
        }
        for (id, code) in exited {
            log::warn!("[orchestrator] server {} exited with code {}", id, code);
            self.teardown(id, &format!("process_exit_{}", code));
        }
    }
    async fn top_up(&self) {
        while self.registry.pool_count() < self.config.min_pool {
            match self.spawn_server().await {
                Ok(_) => {}
                Err(e) => {
                    log::error!("[orchestrator] pool top-up failed: {}", e);
                    break;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn fixture(bin: &str, args: &[&str], min_pool: usize) -> Orchestrator {
        Orchestrator::new(
            OrchestratorConfig {
                server_bin: PathBuf::from(bin),
                server_args: args.iter().map(|s| s.to_string()).collect(),
                backend_host: "127.0.0.1".to_string(),
                backend_port: 8080,
                min_pool,
                max_players: 8,
            },
            Arc::new(SessionRegistry::new()),
            Arc::new(PortPool::new(27015, 8)),
        )
    }

    #[tokio::test]
    async fn spawn_registers_a_starting_server() {
        let orchestrator = fixture("/bin/sleep", &["300"], 0);
        let server = orchestrator.spawn_server().await.unwrap();
        assert_eq!(server.status, ServerStatus::Starting);
        assert_eq!(server.port, 27015);
        assert!(server.pid.is_some());
        orchestrator.shutdown().await;
    }
    #[tokio::test]
    async fn spawn_failure_releases_the_port() {
        let orchestrator = fixture("/nonexistent/match-server", &[], 0);
        assert!(orchestrator.spawn_server().await.is_err());
        assert_eq!(orchestrator.ports.in_use(), 0);
    }
    #[tokio::test]
    async fn exit_sweep_reaps_crashed_children() {
        let orchestrator = fixture("/bin/false", &[], 0);
        let server = orchestrator.spawn_server().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        orchestrator.tick().await;
        assert!(orchestrator.registry.server(server.id).is_none());
        assert_eq!(orchestrator.ports.in_use(), 0);
    }
    #[tokio::test]
    async fn exit_sweep_ends_the_match_with_exit_reason() {
        let orchestrator = fixture("/bin/false", &[], 0);
        let server = orchestrator.spawn_server().await.unwrap();
        orchestrator.registry.mark_ready_by_port(server.port);
        let m = orchestrator
            .registry
            .create_match(server.id, "survival")
            .unwrap();
        orchestrator.registry.add_player(m.id, "p1").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        orchestrator.tick().await;
        let m = orchestrator.registry.match_by_id(m.id).unwrap();
        assert!(m.is_ended());
        assert!(orchestrator.registry.match_by_player("p1").is_none());
    }
    #[tokio::test]
    async fn top_up_fills_the_minimum_pool() {
        let orchestrator = fixture("/bin/sleep", &["300"], 2);
        orchestrator.tick().await;
        assert_eq!(orchestrator.registry.pool_count(), 2);
        orchestrator.shutdown().await;
        assert_eq!(orchestrator.ports.in_use(), 0);
    }
    #[tokio::test]
    async fn terminate_releases_port_and_unregisters() {
        let orchestrator = fixture("/bin/sleep", &["300"], 0);
        let server = orchestrator.spawn_server().await.unwrap();
        orchestrator.terminate_server(server.id, "test").await;
        assert!(orchestrator.registry.server(server.id).is_none());
        assert_eq!(orchestrator.ports.in_use(), 0);
    }
}
