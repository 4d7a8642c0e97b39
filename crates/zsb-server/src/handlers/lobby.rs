use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /lobby/create`
pub async fn create(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::LobbyCreate>,
) -> impl Responder {
    if req.player_id.is_empty() {
        return fail("invalid_request");
    }
    let lobby = backend.lobbies.create(
        &req.player_id,
        &req.game_mode,
        req.max_players,
        req.name.clone(),
    );
    ok(serde_json::json!({ "lobby": lobby }))
}

/// `POST /lobby/join`: prefix-tolerant on the code.
pub async fn join(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::LobbyJoin>,
) -> impl Responder {
    match backend.lobbies.join(&req.code, &req.player_id) {
        Ok(lobby) => ok(serde_json::json!({ "lobby": lobby })),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /lobby/leave`
pub async fn leave(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::PlayerOnly>,
) -> impl Responder {
    match backend.lobbies.leave(&req.player_id) {
        Some(lobby) => ok(serde_json::json!({ "lobby": lobby })),
        None => ok(serde_json::json!({})),
    }
}

/// `POST /lobby/ready`
pub async fn ready(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::LobbyReady>,
) -> impl Responder {
    match backend.lobbies.set_ready(&req.player_id, req.ready) {
        Ok(lobby) => ok(serde_json::json!({ "lobby": lobby })),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /lobby/start`: leader-only; places the group and binds every
/// member to the fresh match.
pub async fn start(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::LobbyStart>,
) -> impl Responder {
    match backend.start_lobby(&req.player_id, &req.lobby_id).await {
        Ok(started) => ok(serde_json::json!({
            "success": true,
            "matchId": started.game_match.id.to_string(),
            "serverHost": started.server_host,
            "serverPort": started.server_port,
            "lobby": started.lobby,
        })),
        Err(kind) => fail(kind),
    }
}

/// `POST /lobby/status`
pub async fn status(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::LobbyStatus>,
) -> impl Responder {
    match backend.lobbies.get(&req.lobby_id) {
        Some(lobby) => ok(serde_json::json!({ "lobby": lobby })),
        None => fail("lobby_not_found"),
    }
}

/// `POST /lobby/claim_spawn`: the authoritative spawn assignment; match
/// servers call this instead of trusting client-supplied indices.
pub async fn claim_spawn(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::ClaimSpawn>,
) -> impl Responder {
    match backend.lobbies.claim_spawn(&req.lobby_id, &req.player_id) {
        Ok(claim) => ok(claim),
        Err(e) => fail(e.kind()),
    }
}

/// `GET /lobby/list`
pub async fn list(backend: web::Data<Arc<Backend>>) -> impl Responder {
    ok(serde_json::json!({ "lobbies": backend.lobbies.list() }))
}
