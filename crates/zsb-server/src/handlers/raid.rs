use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /raid/prepare`: locks the loadout and opens a Preparing raid.
pub async fn prepare(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::RaidPrepare>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    match backend
        .raids
        .prepare(character, req.lobby_id.clone(), req.loadout.clone())
    {
        Ok(prepared) => ok(prepared),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /raid/cancel`
pub async fn cancel(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::RaidCancel>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    let raid = try_id!(req.raid_id);
    match backend.raids.cancel(character, raid) {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /raid/start`: match-server only.
pub async fn start(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::RaidStart>,
) -> impl Responder {
    let raid = try_id!(req.raid_id);
    let game_match = try_id!(req.match_id);
    match backend
        .raids
        .start(&req.server_secret, raid, game_match, &req.player_ids)
    {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /raid/loadout`: match-server only, read-only hydration.
pub async fn loadout(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::RaidLoadout>,
) -> impl Responder {
    let raid = try_id!(req.raid_id);
    let character = try_id!(req.character_id);
    match backend.raids.loadout(&req.server_secret, raid, character) {
        Ok(view) => ok(view),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /raid/commit`: the signed, at-most-once outcome apply.
pub async fn commit(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::RaidCommit>,
) -> impl Responder {
    let raid = try_id!(req.raid_id);
    let game_match = try_id!(req.match_id);
    match backend.raids.commit(
        &req.server_secret,
        raid,
        game_match,
        &req.outcomes,
        &req.signature,
    ) {
        Ok(committed) => ok(committed),
        Err(e) => fail(e.kind()),
    }
}
