use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use crate::respond::try_id;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /market/list`
pub async fn list(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MarketList>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    let iid = try_id!(req.iid);
    match backend
        .market
        .create(character, &req.op_id, iid, req.price, req.duration_hours)
    {
        Ok(created) => ok(created),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /market/cancel`
pub async fn cancel(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MarketCancel>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    let listing = try_id!(req.listing_id);
    match backend.market.cancel(character, listing) {
        Ok(returned) => ok(returned),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /market/buy`
pub async fn buy(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::MarketBuy>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    let listing = try_id!(req.listing_id);
    match backend.market.buy(character, &req.op_id, listing) {
        Ok(bought) => ok(bought),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /market/browse`
pub async fn browse(backend: web::Data<Arc<Backend>>) -> impl Responder {
    ok(serde_json::json!({ "listings": backend.market.browse() }))
}

/// `POST /market/mine`
pub async fn mine(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::CharacterGet>,
) -> impl Responder {
    let character = try_id!(req.character_id);
    ok(serde_json::json!({ "listings": backend.market.mine(character) }))
}
