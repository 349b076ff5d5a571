//! Client identity resolution for admission control.
//!
//! Order: first entry of the first non-empty `X-Forwarded-For` header, then
//! `X-Real-IP`, then the remote socket address. Forwarding headers are taken
//! as given; deploy behind a proxy that overwrites them.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
};
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Identity used when nothing else is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the client identity from headers and the peer address.
pub fn client_id(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|chain| chain.split(',').next())
        .map(str::trim)
        .find(|first| !first.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Resolve the identity of a request served with connect info.
pub fn client_id_for(request: &Request<Body>) -> String {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_id(request.headers(), remote)
}
