use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `GET /health`
pub async fn health() -> impl Responder {
    ok(serde_json::json!({
        "status": "ok",
        "timestamp": zsb_core::now_millis(),
    }))
}

/// `GET /status`
pub async fn status(backend: web::Data<Arc<Backend>>) -> impl Responder {
    ok(serde_json::json!({
        "stats": backend.registry.stats(),
        "portsInUse": backend.ports.in_use(),
        "uptimeMillis": backend.uptime_millis(),
    }))
}

/// `GET /servers`
pub async fn list(backend: web::Data<Arc<Backend>>) -> impl Responder {
    ok(serde_json::json!({ "servers": backend.registry.servers() }))
}

/// `POST /servers/ready`: Starting→Ready; an unknown port registers on
/// the fly (a match server may outlive a backend restart).
pub async fn ready(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::ServerReady>,
) -> impl Responder {
    let id = match backend.registry.mark_ready_by_port(req.port) {
        Some(id) => id,
        None => {
            let registered = match backend.registry.register_server(
                req.port,
                backend.config.max_players,
                None,
            ) {
                Ok(server) => server,
                Err(e) => return fail(e.kind()),
            };
            backend.registry.mark_ready_by_port(req.port);
            registered.id
        }
    };
    ok(serde_json::json!({ "serverId": id.to_string() }))
}

/// `POST /servers/heartbeat`
pub async fn heartbeat(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::ServerHeartbeat>,
) -> impl Responder {
    let id = try_id!(req.server_id);
    match backend.registry.heartbeat(id, req.player_count) {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}
