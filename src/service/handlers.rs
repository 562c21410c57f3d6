use super::kv_service::KvService;
use super::types::{KvRequest, KvResponse};
use crate::authorizer::rules::{normalize_secret, too_large};
use crate::error::KvError;
use crate::ratelimit::types::Operation;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, Extension, Path},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bytes::BytesMut;
use futures::StreamExt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Header carrying the owner secret on writes.
pub const OWNER_SECRET_HEADER: &str = "x-owner-secret";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the client address is derived from a connection.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpPolicy {
    /// Log a warning for un-forwarded requests from 127.0.0.1, which usually
    /// means a reverse proxy is not passing `X-Forwarded-For`.
    pub warn_on_localhost: bool,
}

pub fn router(service: Arc<KvService>, policy: ClientIpPolicy) -> Router {
    Router::new()
        .route("/", get(handle_index).fallback(handle_missing_key))
        .route(
            "/*key",
            get(handle_get_key)
                .post(handle_post_key)
                .fallback(handle_other_key),
        )
        .layer(Extension(service))
        .layer(Extension(policy))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

impl IntoResponse for KvError {
    fn into_response(self) -> Response {
        let status = match self {
            KvError::BodyRead => StatusCode::INTERNAL_SERVER_ERROR,
            KvError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            KvError::SecretMismatch => StatusCode::FORBIDDEN,
            KvError::CapacityExceeded => StatusCode::INSUFFICIENT_STORAGE,
            KvError::NotFound => StatusCode::NOT_FOUND,
            KvError::EmptyKey
            | KvError::KeyTooLong
            | KvError::TooLarge { .. }
            | KvError::NotIpv4
            | KvError::InvalidSecret => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

impl IntoResponse for KvResponse {
    fn into_response(self) -> Response {
        match self {
            KvResponse::Value(value) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/octet-stream")],
                value,
            )
                .into_response(),
            KvResponse::Written(payload) => (StatusCode::OK, payload).into_response(),
        }
    }
}

pub async fn handle_index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

pub async fn handle_missing_key() -> KvError {
    KvError::EmptyKey
}

pub async fn handle_get_key(
    Extension(service): Extension<Arc<KvService>>,
    Extension(policy): Extension<ClientIpPolicy>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<KvResponse, KvError> {
    // Key checks come before the client is identified or charged
    service.validate_key(&key)?;
    let client_ip = resolve_client_ipv4(peer, &headers, policy, &key)?;

    service.handle_request(KvRequest {
        op: Operation::Read,
        key: &key,
        body: Bytes::new(),
        secret: None,
        client_ip,
    })
}

/// The body is read only after the write has been charged, and never more
/// than one byte past what the value budget allows.
pub async fn handle_post_key(
    Extension(service): Extension<Arc<KvService>>,
    Extension(policy): Extension<ClientIpPolicy>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<KvResponse, KvError> {
    service.validate_key(&key)?;
    let client_ip = resolve_client_ipv4(peer, &headers, policy, &key)?;
    let secret = owner_secret(&headers)?;

    service.admit(client_ip, Operation::Write)?;
    let limit = service.value_limit(secret)?;
    let value = read_body_limited(body, limit)
        .await?
        .ok_or_else(|| too_large(normalize_secret(secret)))?;

    service
        .handle_write(&key, value, secret, client_ip)
        .map(KvResponse::Written)
}

/// Any other method on a key is charged like a read and answered with an
/// empty 200.
pub async fn handle_other_key(
    Extension(service): Extension<Arc<KvService>>,
    Extension(policy): Extension<ClientIpPolicy>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, KvError> {
    service.validate_key(&key)?;
    let client_ip = resolve_client_ipv4(peer, &headers, policy, &key)?;
    service.admit(client_ip, Operation::Read)?;
    Ok(StatusCode::OK)
}

/// The raw `X-Owner-Secret` bytes as text. Anything that is not UTF-8 is
/// rejected rather than treated as an absent secret.
fn owner_secret(headers: &HeaderMap) -> Result<Option<&str>, KvError> {
    headers
        .get(OWNER_SECRET_HEADER)
        .map(|value| std::str::from_utf8(value.as_bytes()).map_err(|_| KvError::InvalidSecret))
        .transpose()
}

/// Collects at most `limit` bytes. `Ok(None)` means the body is longer.
async fn read_body_limited(body: Body, limit: usize) -> Result<Option<Bytes>, KvError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("Failed to read request body: {}", e);
            KvError::BodyRead
        })?;
        if buf.len() + chunk.len() > limit {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Some(buf.freeze()))
}

fn resolve_client_ipv4(
    peer: SocketAddr,
    headers: &HeaderMap,
    policy: ClientIpPolicy,
    key: &str,
) -> Result<Ipv4Addr, KvError> {
    let ip = client_ip(peer.ip(), headers);

    if policy.warn_on_localhost && ip == IpAddr::V4(Ipv4Addr::LOCALHOST) {
        tracing::warn!(
            key,
            forwarded_for = ?headers.get(FORWARDED_FOR_HEADER),
            user_agent = ?headers.get(header::USER_AGENT),
            referer = ?headers.get(header::REFERER),
            "Request from localhost; the reverse proxy may not be forwarding client addresses"
        );
    }

    as_ipv4(ip).ok_or(KvError::NotIpv4)
}

/// The peer address, unless the peer is a private or loopback host (a
/// reverse proxy), in which case the first parseable `X-Forwarded-For` entry
/// wins.
pub fn client_ip(peer: IpAddr, headers: &HeaderMap) -> IpAddr {
    if !is_trusted_proxy(peer) {
        return peer;
    }

    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|list| {
            list.split(',')
                .find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
        })
        .unwrap_or(peer)
}

fn is_trusted_proxy(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        // fc00::/7 unique local addresses
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn as_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}
