use crate::backend::Backend;
use crate::dto;
use crate::respond::fail;
use crate::respond::ok;
use actix_web::Responder;
use actix_web::web;
use std::sync::Arc;

/// `POST /friends/add`
pub async fn add(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::FriendPair>,
) -> impl Responder {
    match backend.friends.send_request(&req.player_id, &req.target_id) {
        Ok(request) => ok(serde_json::json!({ "request": request })),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /friends/accept`
pub async fn accept(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::FriendPair>,
) -> impl Responder {
    match backend.friends.accept(&req.player_id, &req.target_id) {
        Ok(friend) => ok(serde_json::json!({ "friend": friend })),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /friends/decline`
pub async fn decline(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::FriendPair>,
) -> impl Responder {
    match backend.friends.decline(&req.player_id, &req.target_id) {
        Ok(()) => ok(serde_json::json!({})),
        Err(e) => fail(e.kind()),
    }
}

/// `POST /friends/remove`
pub async fn remove(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::FriendPair>,
) -> impl Responder {
    backend.friends.remove(&req.player_id, &req.target_id);
    ok(serde_json::json!({}))
}

/// `POST /friends/status`: presence upsert.
pub async fn status(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::PresenceUpdate>,
) -> impl Responder {
    let presence = backend.friends.update_presence(
        &req.player_id,
        req.display_name.as_deref(),
        req.online,
        req.current_game.clone(),
    );
    ok(serde_json::json!({ "presence": presence }))
}

/// `POST /friends/requests`
pub async fn requests(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::PlayerOnly>,
) -> impl Responder {
    ok(serde_json::json!({
        "requests": backend.friends.list_pending(&req.player_id),
        "invites": backend.friends.invites(&req.player_id),
    }))
}

/// `POST /friends/invite`
pub async fn invite(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::SendInvite>,
) -> impl Responder {
    let invite = backend
        .friends
        .send_invite(&req.from_id, &req.to_id, req.server.clone());
    ok(serde_json::json!({ "invite": invite }))
}

/// `POST /friends/list`
pub async fn list(
    backend: web::Data<Arc<Backend>>,
    req: web::Json<dto::PlayerOnly>,
) -> impl Responder {
    ok(serde_json::json!({ "friends": backend.friends.list_friends(&req.player_id) }))
}
