use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /character/get`: full snapshot for client reconciliation.
pub async fn get(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::CharacterGet>,
) -> impl Responder {
    let id = try_id!(req.character_id);
    match backend.inventory.snapshot(id) {
        Ok(snapshot) => ok(snapshot),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /character/move_item`
pub async fn move_item(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MoveItem>,
) -> impl Responder {
    let id = try_id!(req.character_id);
    let iid = try_id!(req.iid);
    if req.rotation > 1 {
        return fail("invalid_request");
    }
    match backend
        .inventory
        .move_item(id, &req.op_id, iid, req.x, req.y, req.rotation)
    {
        Ok(moved) => ok(moved),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /character/split_stack`
pub async fn split_stack(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::SplitStack>,
) -> impl Responder {
    let id = try_id!(req.character_id);
    let iid = try_id!(req.iid);
    match backend
        .inventory
        .split_stack(id, &req.op_id, iid, req.amount, req.x, req.y)
    {
        Ok(split) => ok(split),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /character/discard_item`
pub async fn discard_item(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::DiscardItem>,
) -> impl Responder {
    let id = try_id!(req.character_id);
    let iid = try_id!(req.iid);
    match backend.inventory.discard_item(id, &req.op_id, iid) {
        Ok(discarded) => ok(discarded),
        Err(e) => fail(e.kind()),
    }
}
