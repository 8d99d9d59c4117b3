use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Entries beyond this count trigger a sweep of expired windows.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
        }
    }
}

/// Fixed window counter per client address.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<IpAddr, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts one request; `Err` carries the seconds until the window resets.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.windows.entry(ip).or_insert((now, 0));
        let (started, count) = &mut *entry;
        let elapsed = now.saturating_duration_since(*started);
        if elapsed >= self.config.window {
            *started = now;
            *count = 0;
        }
        if *count >= self.config.max_requests {
            let remaining = self.config.window - now.saturating_duration_since(*started);
            return Err(remaining.as_secs().max(1));
        }
        *count += 1;
        Ok(())
    }

    fn prune(&self, now: Instant) {
        let window = self.config.window;
        self.windows
            .retain(|_, (started, _)| now.saturating_duration_since(*started) < window);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Peer address from `ConnectInfo`, else the first `x-forwarded-for` entry.
fn client_ip(request: &Request) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

pub async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if let Some(ip) = client_ip(&request) {
        if let Err(retry_after) = state.rate_limiter.check(ip) {
            debug!("Rate limited {}", ip);
            return ApiError::RateLimited { retry_after }.into_response();
        }
    }
    next.run(request).await
}
