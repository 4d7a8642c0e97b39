use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

/// 200 with a JSON body.
pub fn ok<T: Serialize>(body: T) -> HttpResponse {
    HttpResponse::Ok().json(body)
}

/// `{error: <kind>}` with the status the kind maps to.
pub fn fail(kind: &str) -> HttpResponse {
    HttpResponse::build(status_for(kind)).json(serde_json::json!({ "error": kind }))
}

/// Stable error kinds map onto a small set of statuses: missing
/// resources 404, authorization 403, capacity 503, everything else is a
/// client error.
fn status_for(kind: &str) -> StatusCode {
    match kind {
        "character_not_found" | "item_not_found" | "listing_not_found" | "match_not_found"
        | "server_not_found" | "lobby_not_found" | "trader_not_found" | "raid_not_found"
        | "request_not_found" => StatusCode::NOT_FOUND,
        "not_leader" | "not_your_raid" | "not_your_listing" | "invalid_server_secret" => {
            StatusCode::FORBIDDEN
        }
        "no_servers_available" | "server_failed_to_start" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Parses a client-supplied uuid string, or answers `invalid_request`.
macro_rules! try_id {
    ($raw:expr) => {
        match $raw.parse() {
            Ok(id) => id,
            Err(_) => return crate::respond::fail("invalid_request"),
        }
    };
}
pub(crate) use try_id;

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn kinds_map_to_expected_statuses() {
        assert_eq!(status_for("lobby_not_found"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("invalid_server_secret"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("no_servers_available"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for("invalid_signature"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("position_blocked"), StatusCode::BAD_REQUEST);
    }
}
