//! Unified Backend Server
//!
//! Combines the HTTP control-plane API, the framed TCP discovery
//! protocol, and the match-server supervisory loops behind one startup
//! object.
//!
//! ## Submodules
//!
//! - [`backend`] — service wiring and matchmaking orchestration
//! - [`handlers`] — actix-web route handlers per API area
//! - [`seed`] — in-process state seeded at startup (no database)
mod backend;
mod config;
mod dto;
mod handlers;
mod respond;
mod seed;

pub use backend::*;
pub use config::*;
pub use seed::*;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpServer;
use actix_web::middleware::Logger;
use actix_web::web;
use zsb_discovery::DiscoveryServer;

#[rustfmt::skip]
pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    let backend = Backend::new(config)?;
    backend.spawn_background_tasks();
    let discovery = DiscoveryServer::bind(
        backend.discovery.clone(),
        &backend.config.discovery_addr,
    )
    .await?;
    tokio::spawn(discovery.run());
    let bind_addr = backend.config.bind_addr.clone();
    let data = web::Data::new(backend);
    let on_exit = data.clone();
    log::info!("starting backend on {}", bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(data.clone())
            .route("/health", web::get().to(handlers::servers::health))
            .route("/status", web::get().to(handlers::servers::status))
            .route("/servers", web::get().to(handlers::servers::list))
            .service(
                web::scope("/servers")
                    .route("/ready", web::post().to(handlers::servers::ready))
                    .route("/heartbeat", web::post().to(handlers::servers::heartbeat)),
            )
            .service(
                web::scope("/match")
                    .route("/find", web::post().to(handlers::matchmaking::find))
                    .route("/{matchId}", web::get().to(handlers::matchmaking::get)),
            )
            .service(
                web::scope("/game")
                    .route("/player_joined", web::post().to(handlers::game::player_joined))
                    .route("/player_left", web::post().to(handlers::game::player_left))
                    .route("/wave_complete", web::post().to(handlers::game::wave_complete))
                    .route("/match_end", web::post().to(handlers::game::match_end)),
            )
            .service(
                web::scope("/friends")
                    .route("/add", web::post().to(handlers::friends::add))
                    .route("/accept", web::post().to(handlers::friends::accept))
                    .route("/decline", web::post().to(handlers::friends::decline))
                    .route("/remove", web::post().to(handlers::friends::remove))
                    .route("/status", web::post().to(handlers::friends::status))
                    .route("/requests", web::post().to(handlers::friends::requests))
                    .route("/invite", web::post().to(handlers::friends::invite))
                    .route("/list", web::post().to(handlers::friends::list)),
            )
            .service(
                web::scope("/lobby")
                    .route("/create", web::post().to(handlers::lobby::create))
                    .route("/join", web::post().to(handlers::lobby::join))
                    .route("/leave", web::post().to(handlers::lobby::leave))
                    .route("/ready", web::post().to(handlers::lobby::ready))
                    .route("/start", web::post().to(handlers::lobby::start))
                    .route("/status", web::post().to(handlers::lobby::status))
                    .route("/claim_spawn", web::post().to(handlers::lobby::claim_spawn))
                    .route("/list", web::get().to(handlers::lobby::list)),
            )
            .service(
                web::scope("/character")
                    .route("/get", web::post().to(handlers::character::get))
                    .route("/move_item", web::post().to(handlers::character::move_item))
                    .route("/split_stack", web::post().to(handlers::character::split_stack))
                    .route("/discard_item", web::post().to(handlers::character::discard_item)),
            )
            .service(
                web::scope("/raid")
                    .route("/prepare", web::post().to(handlers::raid::prepare))
                    .route("/cancel", web::post().to(handlers::raid::cancel))
                    .route("/start", web::post().to(handlers::raid::start))
                    .route("/loadout", web::post().to(handlers::raid::loadout))
                    .route("/commit", web::post().to(handlers::raid::commit)),
            )
            .service(
                web::scope("/market")
                    .route("/list", web::post().to(handlers::market::list))
                    .route("/cancel", web::post().to(handlers::market::cancel))
                    .route("/buy", web::post().to(handlers::market::buy))
                    .route("/browse", web::post().to(handlers::market::browse))
                    .route("/mine", web::post().to(handlers::market::mine)),
            )
            .service(
                web::scope("/trader")
                    .route("/list", web::post().to(handlers::trader::list))
                    .route("/offers", web::post().to(handlers::trader::offers))
                    .route("/buy", web::post().to(handlers::trader::buy))
                    .route("/sell", web::post().to(handlers::trader::sell)),
            )
    })
    .workers(6)
    .bind(&bind_addr)?
    .run()
    .await?;
    log::info!("http server stopped, terminating match servers");
    on_exit.orchestrator.shutdown().await;
    Ok(())
}
