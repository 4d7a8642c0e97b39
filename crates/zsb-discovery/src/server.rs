use super::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use zsb_core::ID;
use zsb_core::Port;
use zsb_core::UnixMillis;
use zsb_registry::SessionRegistry;

/// A client-hosted game session registered over the discovery socket.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: ID<HostedSession>,
    pub name: String,
    pub host_ip: String,
    pub port: Port,
    pub max_players: usize,
    pub current_players: usize,
    pub game_version: String,
    pub registered_at: UnixMillis,
}

impl From<&HostedSession> for SessionInfo {
    fn from(s: &HostedSession) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name.clone(),
            host_ip: s.host_ip.clone(),
            host_port: s.port,
            max_players: s.max_players,
            current_players: s.current_players,
            game_version: s.game_version.clone(),
        }
    }
}

/// Session table behind the discovery protocol. Listing also surfaces
/// the registry's Ready servers so quick-play hosts and player-hosted
/// sessions appear in one browser.
pub struct DiscoveryService {
    registry: Arc<SessionRegistry>,
    public_host: String,
    sessions: Mutex<HashMap<ID<HostedSession>, HostedSession>>,
}

impl DiscoveryService {
    pub fn new(registry: Arc<SessionRegistry>, public_host: &str) -> Self {
        Self {
            registry,
            public_host: public_host.to_string(),
            sessions: Mutex::new(HashMap::new()),
        }
    }
    pub fn register(&self, host_ip: &str, request: RegisterHost) -> HostedSession {
        let session = HostedSession {
            id: ID::default(),
            name: request.name,
            host_ip: host_ip.to_string(),
            port: request.port,
            max_players: request.max_players,
            current_players: request.current_players,
            game_version: request.game_version,
            registered_at: zsb_core::now_millis(),
        };
        self.sessions
            .lock()
            .expect("discovery lock")
            .insert(session.id, session.clone());
        log::info!(
            "[discovery] registered session {} at {}:{}",
            session.id,
            session.host_ip,
            session.port
        );
        session
    }
    pub fn unregister(&self, id: ID<HostedSession>) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("discovery lock")
            .remove(&id)
            .is_some();
        if removed {
            log::info!("[discovery] unregistered session {}", id);
        }
        removed
    }
    pub fn heartbeat(&self, id: ID<HostedSession>, current_players: usize) -> bool {
        match self.sessions.lock().expect("discovery lock").get_mut(&id) {
            Some(session) => {
                session.current_players = current_players;
                true
            }
            None => false,
        }
    }
    /// Hosted sessions plus the registry's Ready servers.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .lock()
            .expect("discovery lock")
            .values()
            .map(SessionInfo::from)
            .collect();
        sessions.extend(self.registry.available_servers().iter().map(|s| SessionInfo {
            id: s.id.to_string(),
            name: format!("server-{}", s.port),
            host_ip: self.public_host.clone(),
            host_port: s.port,
            max_players: s.max_players,
            current_players: s.current_players,
            game_version: String::new(),
        }));
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }
    /// Join target for a session id, hosted or orchestrated.
    pub fn join(&self, id: &str) -> Option<(String, Port)> {
        if let Ok(parsed) = id.parse::<ID<HostedSession>>() {
            if let Some(session) = self.sessions.lock().expect("discovery lock").get(&parsed) {
                return Some((session.host_ip.clone(), session.port));
            }
            if let Some(server) = self.registry.server(parsed.cast()) {
                if server.status.is_live() {
                    return Some((self.public_host.clone(), server.port));
                }
            }
        }
        None
    }
}

/// Accept loop for the framed protocol.
pub struct DiscoveryServer {
    service: Arc<DiscoveryService>,
    listener: TcpListener,
}

impl DiscoveryServer {
    pub async fn bind(service: Arc<DiscoveryService>, addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("[discovery] listening on {}", listener.local_addr()?);
        Ok(Self { service, listener })
    }
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let service = self.service.clone();
                    tokio::spawn(async move {
                        Connection::new(service, peer.ip().to_string())
                            .run(stream)
                            .await;
                    });
                }
                Err(e) => {
                    log::error!("[discovery] accept failed: {}", e);
                }
            }
        }
    }
}

/// One client connection. Tracks the sessions it registered so they can
/// be removed when the socket drops.
struct Connection {
    service: Arc<DiscoveryService>,
    peer_ip: String,
    owned: Vec<ID<HostedSession>>,
}

impl Connection {
    fn new(service: Arc<DiscoveryService>, peer_ip: String) -> Self {
        Self {
            service,
            peer_ip,
            owned: Vec::new(),
        }
    }
    async fn run(mut self, mut stream: TcpStream) {
        log::debug!("[discovery] {} connected", self.peer_ip);
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        'conn: loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break 'conn,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
            loop {
                let (kind, payload, consumed) = match decode_frame(&buf) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("[discovery] {} framing error: {}", self.peer_ip, e);
                        break 'conn;
                    }
                };
                let payload = payload.to_vec();
                buf.drain(..consumed);
                if let Some(response) = self.dispatch(kind, &payload) {
                    if stream.write_all(&response.frame()).await.is_err() {
                        break 'conn;
                    }
                }
            }
        }
        for id in self.owned.drain(..) {
            self.service.unregister(id);
        }
        log::debug!("[discovery] {} disconnected", self.peer_ip);
    }
    /// Unregister has no success response in the protocol; everything
    /// else answers with its matching kind or an Error frame.
    fn dispatch(&mut self, kind: u8, payload: &[u8]) -> Option<ServerMessage> {
        let message = match ClientMessage::decode(kind, payload) {
            Ok(message) => message,
            Err(e) => return Some(ServerMessage::Error(e.to_string())),
        };
        match message {
            ClientMessage::RegisterHost(request) => {
                let session = self.service.register(&self.peer_ip, request);
                self.owned.push(session.id);
                Some(ServerMessage::SessionCreated(session.id.to_string()))
            }
            ClientMessage::UnregisterHost(id) => match id.parse::<ID<HostedSession>>() {
                Ok(id) if self.service.unregister(id) => {
                    self.owned.retain(|o| *o != id);
                    None
                }
                _ => Some(ServerMessage::Error("session not found".into())),
            },
            ClientMessage::ListSessions => Some(ServerMessage::SessionList(self.service.list())),
            ClientMessage::JoinSession(id) => match self.service.join(&id) {
                Some((host_ip, host_port)) => Some(ServerMessage::JoinInfo { host_ip, host_port }),
                None => Some(ServerMessage::Error("session not found".into())),
            },
            ClientMessage::Heartbeat(beat) => match beat.session_id.parse::<ID<HostedSession>>() {
                Ok(id) if self.service.heartbeat(id, beat.current_players) => {
                    Some(ServerMessage::HeartbeatAck)
                }
                _ => Some(ServerMessage::Error("session not found".into())),
            },
        }
    }
}
