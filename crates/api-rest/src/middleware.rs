//! Request middleware: API key check and client IP tracking.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use clinic_api_shared::{validate_api_key, API_KEY_HEADER};
use std::net::{IpAddr, SocketAddr};

/// Client address attached to each request's extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Rejects `/apis` requests without the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    validate_api_key(state.api_key.as_deref(), provided)?;
    Ok(next.run(req).await)
}

/// Records the client IP, preferring proxy headers over the socket peer.
pub async fn track_client_ip(mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(req.headers(), peer);

    match ip {
        Some(ip) => tracing::info!("{} {} from {}", req.method(), req.uri().path(), ip),
        None => tracing::info!("{} {} from unknown client", req.method(), req.uri().path()),
    }
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}

/// First address in `x-forwarded-for`, then `x-real-ip`, then the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());
    let real = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };
    forwarded.or_else(real).or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let peer: IpAddr = "10.0.0.9".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some(peer));

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.4"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.4".parse().ok());

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_garbage_forwarded_for_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers, None), None);
    }
}
