use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

const WINDOW: Duration = Duration::from_secs(1);
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed one-second window per client address.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    rps: u32,
    trust_proxy: bool,
    windows: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    fn new(rps: u32, trust_proxy: bool) -> Self {
        Self {
            rps: rps.max(1),
            trust_proxy,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.start) < WINDOW);
        }

        let window = windows.entry(client.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= WINDOW {
            window.start = now;
            window.count = 0;
        }
        if window.count < self.rps {
            window.count += 1;
            true
        } else {
            false
        }
    }

    fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }
}

/// X-Forwarded-For is client-controlled unless a proxy in front rewrites it,
/// so it only counts when `trust_proxy` is set.
fn client_key(req: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&req, state.trust_proxy);
    if !state.allow(&client) {
        tracing::warn!(%client, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate_limit_exceeded" })),
        )
            .into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(rps: u32, trust_proxy: bool) -> RateLimiter {
    RateLimiter::new(rps, trust_proxy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_each_client_separately() {
        let limiter = RateLimiter::new(2, false);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn window_resets_after_a_second() {
        let limiter = RateLimiter::new(1, false);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now + Duration::from_millis(500)));
        assert!(limiter.allow_at("a", now + Duration::from_secs(1)));
    }

    #[test]
    fn zero_rps_still_allows_one_request() {
        let limiter = RateLimiter::new(0, false);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn forwarded_header_counts_only_behind_a_trusted_proxy() {
        let forwarded = || {
            Request::builder()
                .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(client_key(&forwarded(), true), "10.0.0.1");
        assert_eq!(client_key(&forwarded(), false), "unknown");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req, true), "unknown");
    }

    #[test]
    fn spoofed_forwarded_headers_share_the_peer_window() {
        let limiter = RateLimiter::new(1, false);
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let spoofed = |ip: &str| {
            let mut req = Request::builder()
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap();
            req.extensions_mut().insert(ConnectInfo(peer));
            req
        };

        let first = client_key(&spoofed("1.1.1.1"), limiter.trust_proxy);
        let second = client_key(&spoofed("2.2.2.2"), limiter.trust_proxy);
        assert_eq!(first, "192.0.2.7");
        assert_eq!(first, second);
        assert!(limiter.allow(&first));
        assert!(!limiter.allow(&second));
    }
}
