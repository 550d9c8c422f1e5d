//! Per-client-address request limiting for the HTTP surface.
//!
//! Each client IP gets a bucket of `limit` requests refilled evenly across
//! `window`, enforced with governor's keyed GCRA limiter.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    exempt: HashSet<(Method, String)>,
}

impl ClientRateLimiter {
    /// `limit` requests per `window`; `exempt` entries look like "GET /health".
    pub fn new(limit: u32, window: Duration, exempt: &[String]) -> Self {
        let burst = NonZeroU32::new(limit.max(1)).unwrap_or(NonZeroU32::MIN);
        let period = (window / burst.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);

        let exempt = exempt
            .iter()
            .filter_map(|route| {
                let (method, path) = route.trim().split_once(' ')?;
                let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()).ok()?;
                Some((method, path.trim().to_string()))
            })
            .collect();

        Self {
            limiter: RateLimiter::keyed(quota),
            exempt,
        }
    }

    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        self.exempt.contains(&(method.clone(), path.to_string()))
    }

    /// Consume one request for `client`; false when the client is over quota
    pub fn check(&self, client: IpAddr) -> bool {
        self.limiter.check_key(&client).is_ok()
    }

    /// Drop buckets that have fully refilled
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if limiter.is_exempt(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(client) {
        warn!("Rate limit exceeded for {}", client);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Rate limit exceeded. Please try again later."})),
        )
            .into_response();
    }

    debug!("Request from {} admitted", client);
    next.run(req).await
}
