use std::{
    env,
    net::{IpAddr, Ipv4Addr},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use tracing::{debug, instrument, warn};

const DEFAULT_GAMES_PER_MINUTE: u32 = 10;
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
pub struct TokenBucket {
    last_refill: Instant,
    tokens: u32,
    capacity: u32,
    refill_rate: u32,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32, refill_interval: Duration) -> Self {
        debug!(
            "Creating new token bucket: capacity={}, refill_rate={}, interval={}s",
            capacity,
            refill_rate,
            refill_interval.as_secs()
        );
        Self {
            last_refill: Instant::now(),
            tokens: capacity,
            capacity,
            refill_rate,
            refill_interval,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            debug!("Token consumed, remaining: {}", self.tokens);
            true
        } else {
            debug!("No tokens available for consumption");
            false
        }
    }

    /// Idle for a full interval, so a refill would leave it at capacity.
    fn is_idle(&self) -> bool {
        self.last_refill.elapsed() >= self.refill_interval
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        let intervals = elapsed.as_secs() / self.refill_interval.as_secs().max(1);

        if intervals > 0 {
            let tokens_to_add = u32::try_from(intervals)
                .unwrap_or(u32::MAX)
                .saturating_mul(self.refill_rate);
            self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.capacity);
            self.last_refill = Instant::now();
        }
    }
}

/// Per-client token buckets guarding game creation.
///
/// Once more than `PRUNE_THRESHOLD` clients are tracked, idle buckets are
/// dropped before the next check. The client address comes from
/// `X-Forwarded-For`/`X-Real-IP` when present, so the limit is only as
/// trustworthy as the proxy in front of the server.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    games_per_minute: u32,
}

impl RateLimiter {
    pub fn new(games_per_minute: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            games_per_minute,
        }
    }

    pub fn from_env() -> Self {
        let games_per_minute = env::var("RATE_LIMIT_GAMES_PER_MINUTE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_GAMES_PER_MINUTE);
        Self::new(games_per_minute)
    }

    fn prune_idle(&self) {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle());
        debug!("Pruned {} idle rate limit buckets", before.saturating_sub(self.buckets.len()));
    }
}

#[derive(Debug)]
pub struct ClientIp(pub IpAddr);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|header| header.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
            .or_else(|| {
                req.headers()
                    .get_one("X-Real-IP")
                    .and_then(|ip| ip.parse().ok())
            })
            .or_else(|| req.client_ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        request::Outcome::Success(ClientIp(ip))
    }
}

#[instrument(level = "trace", skip(rate_limiter, client_ip), fields(client_ip = %client_ip.0))]
pub fn check_rate_limit(rate_limiter: &RateLimiter, client_ip: &ClientIp) -> Result<(), Status> {
    let capacity = rate_limiter.games_per_minute;
    let refill_interval = Duration::from_secs(60);

    if rate_limiter.buckets.len() > PRUNE_THRESHOLD {
        rate_limiter.prune_idle();
    }

    let mut entry = rate_limiter
        .buckets
        .entry(client_ip.0)
        .or_insert_with(|| TokenBucket::new(capacity, capacity, refill_interval));

    if entry.try_consume() {
        debug!("Rate limit check passed for {}", client_ip.0);
        Ok(())
    } else {
        warn!("Rate limit exceeded for {} - rejecting request", client_ip.0);
        Err(Status::TooManyRequests)
    }
}
