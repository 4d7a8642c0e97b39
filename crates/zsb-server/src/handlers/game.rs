use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /game/player_joined`
pub async fn player_joined(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MatchPlayer>,
) -> impl Responder {
    let id = try_id!(req.match_id);
    match backend.registry.add_player(id, &req.player_id) {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /game/player_left`: removal is silent when absent.
pub async fn player_left(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MatchPlayer>,
) -> impl Responder {
    let id = try_id!(req.match_id);
    backend.registry.remove_player(id, &req.player_id);
    ok(serde_json::json!({}))
}

/// `POST /game/wave_complete`
pub async fn wave_complete(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::WaveComplete>,
) -> impl Responder {
    let id = try_id!(req.match_id);
    log::info!(
        "[game] match {} cleared wave {} ({} zombies)",
        id,
        req.wave_number,
        req.zombies_killed
    );
    match backend.registry.record_wave(id, req.wave_number) {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /game/match_end`
pub async fn match_end(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MatchEnd>,
) -> impl Responder {
    let id = try_id!(req.match_id);
    match backend.registry.end_match(id, &req.reason) {
        Ok(ended) => ok(serde_json::json!({
            "match": ended,
            "finalWave": req.final_wave,
        })),
        Err(e) => fail(e.kind()),
    }
}
