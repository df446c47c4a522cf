//! Per-client rate limiting.
//!
//! Each client IP gets a `governor` quota of `limit` requests per minute,
//! refilled continuously (GCRA). Every response carries `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset` (unix seconds); requests
//! over the quota are answered with `429 Too Many Requests` without reaching
//! the router.

use super::error::ApiError;
use crate::server::telemetry::increment_rate_limited;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Checks between sweeps of clients whose quota has fully refilled.
const PRUNE_EVERY: u64 = 1024;

type KeyedLimiter<C> =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, C, StateInformationMiddleware>;

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's quota is usable again (rejected) or fully
    /// refilled (allowed).
    pub reset_after: Duration,
}

pub struct ClientRateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    quota: Quota,
    checks: AtomicU64,
}

impl ClientRateLimiter {
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self::with_clock(Quota::per_minute(limit), DefaultClock::default())
    }
}

impl<C: Clock> ClientRateLimiter<C> {
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        Self {
            limiter: RateLimiter::dashmap_with_clock(quota, clock)
                .with_middleware::<StateInformationMiddleware>(),
            quota,
            checks: AtomicU64::new(0),
        }
    }

    /// Counts a request from `ip`.
    pub fn check(&self, ip: IpAddr) -> Decision {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        let limit = self.quota.burst_size().get();
        match self.limiter.check_key(&ip) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                Decision {
                    allowed: true,
                    limit,
                    remaining,
                    reset_after: self.quota.replenish_interval() * (limit - remaining),
                }
            }
            Err(not_until) => Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_after: not_until.wait_time_from(self.limiter.clock().now()),
            },
        }
    }

    /// Forgets clients whose quota has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl Decision {
    fn write_headers(&self, headers: &mut HeaderMap) {
        let reset_at = SystemTime::now()
            .checked_add(self.reset_after)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at));
    }
}

/// Applies the limiter to the peer address recorded by
/// `into_make_service_with_connect_info`. Requests without one pass through.
pub async fn rate_limit(
    State(limiter): State<Arc<ClientRateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied()
    else {
        return next.run(req).await;
    };

    let decision = limiter.check(peer.ip());
    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        increment_rate_limited();
        tracing::warn!(client = %peer.ip(), "rate limit exceeded");
        ApiError::RateLimited.into_response()
    };
    decision.write_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    const A: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2));

    fn limiter(limit: u32) -> (ClientRateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let quota = Quota::per_minute(NonZeroU32::new(limit).unwrap());
        (ClientRateLimiter::with_clock(quota, clock.clone()), clock)
    }

    #[test]
    fn allows_burst_then_rejects() {
        let (limiter, _) = limiter(5);

        for remaining in (0..5).rev() {
            let d = limiter.check(A);
            assert!(d.allowed);
            assert_eq!(d.remaining, remaining);
        }

        let d = limiter.check(A);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.limit, 5);
    }

    #[test]
    fn clients_are_counted_separately() {
        let (limiter, _) = limiter(1);
        assert!(limiter.check(A).allowed);
        assert!(!limiter.check(A).allowed);
        assert!(limiter.check(B).allowed);
    }

    #[test]
    fn quota_refills_one_request_per_interval() {
        // 5 per minute refills one request every 12 seconds.
        let (limiter, clock) = limiter(5);
        for _ in 0..5 {
            assert!(limiter.check(A).allowed);
        }

        let d = limiter.check(A);
        assert!(!d.allowed);
        assert!(d.reset_after > Duration::ZERO);
        assert!(d.reset_after <= Duration::from_secs(12));

        clock.advance(Duration::from_secs(12));
        assert!(limiter.check(A).allowed);
        assert!(!limiter.check(A).allowed);
    }

    #[test]
    fn refilled_clients_are_pruned() {
        let (limiter, clock) = limiter(1);
        limiter.check(A);
        limiter.check(B);
        assert_eq!(limiter.tracked_clients(), 2);

        clock.advance(Duration::from_secs(61));
        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn headers_are_written() {
        let (limiter, _) = limiter(5);
        let mut headers = HeaderMap::new();
        limiter.check(A).write_headers(&mut headers);
        assert_eq!(headers[&X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "4");
        let reset: u64 = headers[&X_RATELIMIT_RESET].to_str().unwrap().parse().unwrap();
        assert!(reset > 0);
    }
}
