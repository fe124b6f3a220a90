use std::{env, sync::Arc};

use minesweeper_server::{
    build,
    logic::Rules,
    rate_limit::RateLimiter,
    service::GameService,
    store::{MemoryStore, RedisStore, Store},
};
use rocket::{Build, Config, Rocket};
use tracing::{info, warn};

#[rocket::launch]
fn rocket() -> Rocket<Build> {
    tracing_subscriber::fmt::init();
    info!("🚀 Starting Minesweeper API server");

    let store: Arc<dyn Store> = match env::var("REDIS_URL") {
        Ok(url) => {
            info!("💾 Using redis store");
            Arc::new(RedisStore::open(&url).expect("Invalid REDIS_URL"))
        }
        Err(_) => {
            warn!("REDIS_URL not set, games are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let rules = Rules::from_env();
    let service = GameService::new(store, rules);
    let rate_limiter = RateLimiter::from_env();

    info!(
        "📊 Initialized game storage and rate limiter, flagged click policy: {:?}",
        rules.flagged_click
    );

    let mut figment = Config::figment();
    if let Ok(port) = env::var("PORT") {
        match port.parse::<u16>() {
            Ok(port) => figment = figment.merge(("port", port)),
            Err(e) => warn!("Ignoring invalid PORT {:?}: {}", port, e),
        }
    }

    let rocket = build(figment, service, rate_limiter);

    info!("🌐 Server configured with CORS, rate limiting and routes");
    info!(
        "📡 Endpoints: POST /users, PUT /games, POST /games/<game>/<user>/click, \
         GET /games/<game>/<user>[/board], DELETE /games/<game>/<user>"
    );

    rocket
}
