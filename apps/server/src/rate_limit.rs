use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

// ── Configuration ──

/// One rate-limit tier: a sliding window and the number of requests it
/// admits.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug)]
struct Tier {
    config: RateLimitConfig,
    /// Request timestamps per client IP, newest last.
    hits: DashMap<IpAddr, Vec<Instant>>,
}

// ── Core Rate Limiter ──

/// In-memory per-IP sliding-window limiter shared by all middleware layers.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tiers: Arc<DashMap<&'static str, Tier>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            tiers: Arc::new(DashMap::new()),
        }
    }

    pub fn add_tier(&self, name: &'static str, config: RateLimitConfig) {
        self.tiers.insert(
            name,
            Tier {
                config,
                hits: DashMap::new(),
            },
        );
    }

    /// Record a request from `ip` against `tier`. `Err` carries how long the
    /// client must wait before the oldest tracked request leaves the window.
    pub fn check(&self, tier: &'static str, ip: IpAddr) -> Result<(), Duration> {
        let tier = self.tiers.get(tier).expect("unknown rate limit tier");
        let now = Instant::now();
        let window_start = now - tier.config.window;

        let mut timestamps = tier.hits.entry(ip).or_default();
        timestamps.retain(|t| *t > window_start);

        if timestamps.len() >= tier.config.max_requests as usize {
            let oldest = timestamps[0];
            let retry_after = (oldest + tier.config.window).saturating_duration_since(now);
            return Err(retry_after.max(Duration::from_secs(1)));
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drop IPs whose entire history fell out of twice the window. Run from
    /// a periodic background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for tier in self.tiers.iter() {
            let cutoff = tier.config.window * 2;
            tier.hits.retain(|_, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < cutoff);
                !timestamps.is_empty()
            });
        }
    }
}

// ── IP Extraction ──

/// Client IP from X-Forwarded-For (reverse proxy) or the socket address.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or_else(|| "127.0.0.1".parse().unwrap())
}

fn too_many_requests(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs().max(1);
    let body = ApiResponse::<()>::error(format!(
        "คำขอถี่เกินไป กรุณารอ {} วินาทีแล้วลองใหม่",
        secs
    ));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", secs.to_string())],
        Json(body),
    )
        .into_response()
}

// ── Middleware Functions (one per tier) ──

/// Catalog and availability reads (60 req/min).
pub async fn rate_limit_public(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check("public", ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

/// Authenticated customer endpoints (30 req/min).
pub async fn rate_limit_auth(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check("auth", ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

/// Online booking creation, the strictest tier (5 req/5min).
pub async fn rate_limit_booking(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check("booking", ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

/// Technician schedule management (60 req/min).
pub async fn rate_limit_staff(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check("staff", ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

/// Admin dashboard (120 req/min).
pub async fn rate_limit_admin(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check("admin", ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

// ── Tests ──
