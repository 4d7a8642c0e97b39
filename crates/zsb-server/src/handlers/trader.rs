use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /trader/list`
pub async fn list(backend: web::Data<Arc<Backend>>) -> impl Responder {
    ok(serde_json::json!({ "traders": backend.traders.traders() }))
}

/// `POST /trader/offers`: priced and gated for the asking character.
pub async fn offers(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::TraderOffers>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    match backend.traders.offers(&req.trader_id, character) {
        Ok(offers) => ok(serde_json::json!({ "offers": offers })),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /trader/buy`
pub async fn buy(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::TraderBuy>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    match backend.traders.buy(
        character,
        &req.op_id,
        &req.trader_id,
        &req.offer_id,
        req.quantity,
    ) {
        Ok(bought) => ok(bought),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /trader/sell`
pub async fn sell(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::TraderSell>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    let iid = try_id!(req.iid);
    match backend.traders.sell(
        character,
        &req.op_id,
        &req.trader_id,
        iid,
        req.quantity,
    ) {
        Ok(sold) => ok(sold),
        Err(e) => fail(e.kind()),
    }
}
