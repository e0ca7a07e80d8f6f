//! Per-client token-bucket rate limiting.
//!
//! Each limited route group gets its own [`RateLimiter`]. A client is keyed by
//! the first `X-Forwarded-For` address, then `X-Real-IP`, then the TCP peer
//! address. Every client starts with a full bucket of `capacity` tokens and
//! regains one token per `refill_every`; a request with no token left is
//! rejected with HTTP 429.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::error::AppError;

/// How often idle buckets are dropped.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    pub capacity: u32,
    pub refill_every: Duration,
}

impl BucketSpec {
    pub const fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity,
            refill_every,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(spec: BucketSpec, now: Instant) -> Self {
        Self {
            tokens: spec.capacity,
            last_refill: now,
        }
    }

    fn try_take(&mut self, spec: BucketSpec, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = if spec.refill_every.is_zero() {
            spec.capacity
        } else {
            u32::try_from(elapsed.as_nanos() / spec.refill_every.as_nanos()).unwrap_or(u32::MAX)
        };

        if earned > 0 {
            self.tokens = self.tokens.saturating_add(earned).min(spec.capacity);
            self.last_refill = now;
        }

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// Buckets for one route group, keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    spec: Option<BucketSpec>,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(name: &'static str, spec: BucketSpec) -> Self {
        Self {
            name,
            spec: Some(spec),
            buckets: DashMap::new(),
        }
    }

    /// A limiter that admits everything.
    pub fn unlimited(name: &'static str) -> Self {
        Self {
            name,
            spec: None,
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let Some(spec) = self.spec else {
            return true;
        };

        let mut bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(spec, now));
        bucket.try_take(spec, now)
    }

    /// Drop buckets that have been idle long enough to be full again.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let Some(spec) = self.spec else {
            return 0;
        };
        let idle_after = spec.refill_every.saturating_mul(spec.capacity);

        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_after);
        before - self.buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// The limiters for every rate-limited route group.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub register: Arc<RateLimiter>,
    pub login: Arc<RateLimiter>,
    pub purchase: Arc<RateLimiter>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            register: Arc::new(RateLimiter::new(
                "register",
                BucketSpec::new(3, Duration::from_secs(20)),
            )),
            login: Arc::new(RateLimiter::new(
                "login",
                BucketSpec::new(5, Duration::from_secs(12)),
            )),
            purchase: Arc::new(RateLimiter::new(
                "purchase",
                BucketSpec::new(10, Duration::from_secs(6)),
            )),
        }
    }
}

impl RateLimits {
    pub fn unlimited() -> Self {
        Self {
            register: Arc::new(RateLimiter::unlimited("register")),
            login: Arc::new(RateLimiter::unlimited("login")),
            purchase: Arc::new(RateLimiter::unlimited("purchase")),
        }
    }

    fn all(&self) -> [&Arc<RateLimiter>; 3] {
        [&self.register, &self.login, &self.purchase]
    }

    /// Periodically drop idle buckets so the maps don't grow without bound.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let limits = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                for limiter in limits.all() {
                    let removed = limiter.sweep();
                    if removed > 0 {
                        tracing::debug!(
                            limiter = limiter.name,
                            removed,
                            "swept idle rate-limit buckets"
                        );
                    }
                }
            }
        })
    }
}

/// Rate limiting middleware function.
///
/// # Returns
///
/// - `Ok(Response)` if the client still has a token (calls next handler)
/// - `Err(AppError::RateLimited)` otherwise (returns 429)
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);

    if !limiter.check(&client) {
        tracing::warn!(limiter = limiter.name, %client, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

fn client_key(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("X-Forwarded-For") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header("X-Real-IP") {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
