//! Single-player minesweeper served over HTTP.
//!
//! [`data`] holds the board and its rules for revealing and flagging,
//! [`logic`] the game state machine built on top of it, [`service`] the
//! bookkeeping of users and games in a [`store::Store`], and [`routes`] the
//! Rocket endpoints.

use rocket::{Build, Rocket, catchers, figment::Figment, routes};

pub mod cors;
pub mod data;
pub mod error;
pub mod logic;
pub mod rate_limit;
pub mod routes;
pub mod service;
pub mod store;

use crate::{cors::create_cors, rate_limit::RateLimiter, service::GameService};

pub fn build(figment: Figment, service: GameService, rate_limiter: RateLimiter) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(create_cors())
        .manage(service)
        .manage(rate_limiter)
        .mount(
            "/",
            routes![
                routes::create_user,
                routes::create_game,
                routes::click,
                routes::get_game,
                routes::get_board,
                routes::delete_game,
            ],
        )
        .register("/", catchers![routes::default_catcher])
}
