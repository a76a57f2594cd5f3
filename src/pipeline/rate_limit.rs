//! Stage 5: per-IP rate limiting for the API prefix.
//!
//! # Responsibilities
//! - Track request counts per client IP over a fixed window
//! - Fail with 429 and the fixed message once the budget is exhausted
//! - Surface `X-RateLimit-*` headers on limited paths
//!
//! # Design Decisions
//! - Fixed-window eviction: a bucket holds a window start and a count and
//!   resets once the window elapses
//! - The store is explicit and injectable, with a `Clock` seam, so tests
//!   drive time instead of sleeping
//! - `DashMap::entry` locks per key, so increment-and-check never loses a
//!   concurrent hit from the same IP
//! - Stale buckets are swept at most once per window, so the map size is
//!   bounded by the clients seen in the last two windows

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::pipeline::{Context, Outcome, Stage};

/// Time source for the limiter, in whole seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Budget snapshot attached to the request for response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds when the current window ends.
    pub reset_at: u64,
}

struct Bucket {
    window_start: u64,
    count: u32,
}

/// Per-client fixed-window counters.
pub struct RateLimitStore {
    buckets: DashMap<IpAddr, Bucket>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    last_sweep: AtomicU64,
}

impl RateLimitStore {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = AtomicU64::new(clock.now_secs());
        Self {
            buckets: DashMap::new(),
            config,
            clock,
            last_sweep,
        }
    }

    /// Drop every bucket whose window has elapsed. Clients behind a proxy
    /// header can mint arbitrary distinct keys, so without this the map
    /// grows without bound. Runs at most once per window; losers of the
    /// timestamp race skip the pass.
    fn sweep_expired(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.config.window_secs {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            let window = self.config.window_secs;
            self.buckets
                .retain(|_, bucket| now.saturating_sub(bucket.window_start) < window);
        }
    }

    /// Count one hit for `ip`. `Err` carries the exhausted budget snapshot.
    pub fn check_and_increment(&self, ip: IpAddr) -> Result<RateLimitInfo, RateLimitInfo> {
        let now = self.clock.now_secs();
        self.sweep_expired(now);
        let mut bucket = self.buckets.entry(ip).or_insert(Bucket {
            window_start: now,
            count: 0,
        });

        if now.saturating_sub(bucket.window_start) >= self.config.window_secs {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;

        let info = RateLimitInfo {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(bucket.count),
            reset_at: bucket.window_start + self.config.window_secs,
        };
        if bucket.count > self.config.max_requests {
            Err(info)
        } else {
            Ok(info)
        }
    }
}

pub struct RateLimit {
    prefix: String,
    store: Arc<RateLimitStore>,
}

impl RateLimit {
    pub fn new(prefix: String, store: Arc<RateLimitStore>) -> Self {
        Self { prefix, store }
    }
}

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if !req.path().starts_with(&self.prefix) {
            return Outcome::Continue;
        }

        match self.store.check_and_increment(req.client_ip()) {
            Ok(info) => {
                req.set_rate_limit(info);
                Outcome::Continue
            }
            Err(info) => {
                req.set_rate_limit(info);
                tracing::warn!(client = %req.client_ip(), path = %req.path(), "rate limit exceeded");
                metrics::record_rate_limited();
                Outcome::Fail(AppError::TooManyRequests)
            }
        }
    }

    fn finalize(&self, req: &Request, res: &mut Response, _cx: &Context) {
        if let Some(info) = req.rate_limit() {
            res.insert_header("x-ratelimit-limit", &info.limit.to_string());
            res.insert_header("x-ratelimit-remaining", &info.remaining.to_string());
            res.insert_header("x-ratelimit-reset", &info.reset_at.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub struct ManualClock(AtomicU64);

    impl ManualClock {
        pub fn new(start: u64) -> Self {
            Self(AtomicU64::new(start))
        }

        pub fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn store_with(max: u32, window: u64) -> (Arc<RateLimitStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = RateLimitConfig {
            prefix: "/api".to_string(),
            max_requests: max,
            window_secs: window,
        };
        (
            Arc::new(RateLimitStore::new(config, clock.clone())),
            clock,
        )
    }

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));

    #[test]
    fn allows_up_to_the_budget() {
        let (store, _clock) = store_with(3, 60);
        assert!(store.check_and_increment(IP).is_ok());
        assert!(store.check_and_increment(IP).is_ok());
        let last = store.check_and_increment(IP).unwrap();
        assert_eq!(last.remaining, 0);
        assert!(store.check_and_increment(IP).is_err());
    }

    #[test]
    fn window_elapse_resets_the_count() {
        let (store, clock) = store_with(1, 60);
        assert!(store.check_and_increment(IP).is_ok());
        assert!(store.check_and_increment(IP).is_err());

        clock.advance(60);
        assert!(store.check_and_increment(IP).is_ok());
    }

    #[test]
    fn budgets_are_per_client() {
        let (store, _clock) = store_with(1, 60);
        let other = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        assert!(store.check_and_increment(IP).is_ok());
        assert!(store.check_and_increment(other).is_ok());
        assert!(store.check_and_increment(IP).is_err());
    }

    #[test]
    fn stale_buckets_are_swept_once_the_window_elapses() {
        let (store, clock) = store_with(3, 60);
        for i in 0..200u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, i));
            let _ = store.check_and_increment(ip);
        }
        assert_eq!(store.buckets.len(), 200);

        clock.advance(61);
        let _ = store.check_and_increment(IP);
        assert_eq!(store.buckets.len(), 1);
    }

    #[test]
    fn the_sweep_keeps_live_buckets_and_their_counts() {
        let (store, clock) = store_with(3, 60);
        let other = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        let _ = store.check_and_increment(IP);

        clock.advance(40);
        let _ = store.check_and_increment(other);

        // IP's window has elapsed, other's has not.
        clock.advance(21);
        let info = store.check_and_increment(other).unwrap();
        assert_eq!(info.remaining, 1);
        assert_eq!(store.buckets.len(), 1);
    }

    #[test]
    fn concurrent_hits_are_never_undercounted() {
        let (store, _clock) = store_with(1_000_000, 3600);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _ = store.check_and_increment(IP);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let info = store.check_and_increment(IP).unwrap();
        assert_eq!(info.remaining, 1_000_000 - 8001);
    }

    #[tokio::test]
    async fn only_the_api_prefix_is_limited() {
        let (store, _clock) = store_with(1, 60);
        let stage = RateLimit::new("/api".to_string(), store);

        let mut view = Request::test(axum::http::Method::GET, "/tour/forest-hiker");
        for _ in 0..5 {
            assert!(matches!(
                stage.apply(&mut view, &Context::new()).await,
                Outcome::Continue
            ));
        }

        let mut api = Request::test(axum::http::Method::GET, "/api/v1/tours");
        assert!(matches!(
            stage.apply(&mut api, &Context::new()).await,
            Outcome::Continue
        ));
        assert!(matches!(
            stage.apply(&mut api, &Context::new()).await,
            Outcome::Fail(AppError::TooManyRequests)
        ));
    }
}
