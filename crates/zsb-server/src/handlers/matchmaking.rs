use crate::backend::Backend;
use crate::backend::MatchPlacement;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

fn placement_body(p: &MatchPlacement) -> serde_json::Value {
    serde_json::json!({
        "matchId": p.game_match.id.to_string(),
        "status": p.status,
        "serverHost": p.server_host,
        "serverPort": p.server_port,
        "gameMode": p.game_match.game_mode,
    })
}

/// `POST /match/find`: quick play: find-or-spawn, waiting up to the
/// spawn window for a fresh server to come up.
pub async fn find(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::FindMatch>,
) -> impl Responder {
    if req.player_id.is_empty() {
        return fail("invalid_request");
    }
    match backend.find_match(&req.player_id, &req.game_mode).await {
        Ok(placement) => ok(placement_body(&placement)),
        Err(kind) => fail(kind),
    }
}

/// `GET /match/{matchId}`
pub async fn get(backend: web::Data<Arc<Backend>>, path: web::Path<String>) -> impl Responder {
    let id = try_id!(path.into_inner());
    match backend.registry.match_by_id(id) {
        Some(game_match) => ok(serde_json::json!({ "match": game_match })),
        None => fail("match_not_found"),
    }
}
