use serde::Deserialize;
use serde::Serialize;
use zsb_core::Port;

/// Client→server message codes.
pub const MSG_REGISTER_HOST: u8 = 1;
pub const MSG_UNREGISTER_HOST: u8 = 2;
pub const MSG_LIST_SESSIONS: u8 = 3;
pub const MSG_JOIN_SESSION: u8 = 4;
pub const MSG_HEARTBEAT: u8 = 5;
/// Server→client message codes.
pub const MSG_SESSION_CREATED: u8 = 101;
pub const MSG_SESSION_LIST: u8 = 102;
pub const MSG_JOIN_INFO: u8 = 103;
pub const MSG_ERROR: u8 = 104;
pub const MSG_HEARTBEAT_ACK: u8 = 105;

/// Errors from the message codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    UnknownType(u8),
    BadPayload(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown message type {}", t),
            Self::BadPayload(s) => write!(f, "bad payload: {}", s),
        }
    }
}

impl std::error::Error for CodecError {}

/// Payload of RegisterHost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterHost {
    pub name: String,
    pub port: Port,
    pub max_players: usize,
    #[serde(default)]
    pub current_players: usize,
    pub game_version: String,
}

/// Payload of Heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHeartbeat {
    pub session_id: String,
    pub current_players: usize,
}

/// One row of a SessionList response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub host_ip: String,
    pub host_port: Port,
    pub max_players: usize,
    pub current_players: usize,
    pub game_version: String,
}

/// Requests a client may send. Struct payloads are JSON; bare session
/// ids travel as raw UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    RegisterHost(RegisterHost),
    UnregisterHost(String),
    ListSessions,
    JoinSession(String),
    Heartbeat(HostHeartbeat),
}

impl ClientMessage {
    pub fn decode(kind: u8, payload: &[u8]) -> Result<Self, CodecError> {
        let text = |payload: &[u8]| {
            String::from_utf8(payload.to_vec()).map_err(|e| CodecError::BadPayload(e.to_string()))
        };
        match kind {
            MSG_REGISTER_HOST => serde_json::from_slice(payload)
                .map(Self::RegisterHost)
                .map_err(|e| CodecError::BadPayload(e.to_string())),
            MSG_UNREGISTER_HOST => text(payload).map(Self::UnregisterHost),
            MSG_LIST_SESSIONS => Ok(Self::ListSessions),
            MSG_JOIN_SESSION => text(payload).map(Self::JoinSession),
            MSG_HEARTBEAT => serde_json::from_slice(payload)
                .map(Self::Heartbeat)
                .map_err(|e| CodecError::BadPayload(e.to_string())),
            other => Err(CodecError::UnknownType(other)),
        }
    }
    /// Client-side encoder; exercised by tests and reference clients.
    pub fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            Self::RegisterHost(r) => (
                MSG_REGISTER_HOST,
                serde_json::to_vec(r).expect("serialize register host"),
            ),
            Self::UnregisterHost(id) => (MSG_UNREGISTER_HOST, id.as_bytes().to_vec()),
            Self::ListSessions => (MSG_LIST_SESSIONS, Vec::new()),
            Self::JoinSession(id) => (MSG_JOIN_SESSION, id.as_bytes().to_vec()),
            Self::Heartbeat(h) => (
                MSG_HEARTBEAT,
                serde_json::to_vec(h).expect("serialize heartbeat"),
            ),
        }
    }
}

/// Responses the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    SessionCreated(String),
    SessionList(Vec<SessionInfo>),
    JoinInfo { host_ip: String, host_port: Port },
    Error(String),
    HeartbeatAck,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinInfoPayload {
    host_ip: String,
    host_port: Port,
}

impl ServerMessage {
    pub fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            Self::SessionCreated(id) => (MSG_SESSION_CREATED, id.as_bytes().to_vec()),
            Self::SessionList(sessions) => (
                MSG_SESSION_LIST,
                serde_json::to_vec(sessions).expect("serialize session list"),
            ),
            Self::JoinInfo { host_ip, host_port } => (
                MSG_JOIN_INFO,
                serde_json::to_vec(&JoinInfoPayload {
                    host_ip: host_ip.clone(),
                    host_port: *host_port,
                })
                .expect("serialize join info"),
            ),
            Self::Error(message) => (MSG_ERROR, message.as_bytes().to_vec()),
            Self::HeartbeatAck => (MSG_HEARTBEAT_ACK, Vec::new()),
        }
    }
    /// One wire-ready frame.
    pub fn frame(&self) -> Vec<u8> {
        let (kind, payload) = self.encode();
        crate::encode_frame(kind, &payload)
    }
    /// Server-message decoder; exercised by tests and reference clients.
    pub fn decode(kind: u8, payload: &[u8]) -> Result<Self, CodecError> {
        let text = |payload: &[u8]| {
            String::from_utf8(payload.to_vec()).map_err(|e| CodecError::BadPayload(e.to_string()))
        };
        match kind {
            MSG_SESSION_CREATED => text(payload).map(Self::SessionCreated),
            MSG_SESSION_LIST => serde_json::from_slice(payload)
                .map(Self::SessionList)
                .map_err(|e| CodecError::BadPayload(e.to_string())),
            MSG_JOIN_INFO => serde_json::from_slice::<JoinInfoPayload>(payload)
                .map(|p| Self::JoinInfo {
                    host_ip: p.host_ip,
                    host_port: p.host_port,
                })
                .map_err(|e| CodecError::BadPayload(e.to_string())),
            MSG_ERROR => text(payload).map(Self::Error),
            MSG_HEARTBEAT_ACK => Ok(Self::HeartbeatAck),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}
