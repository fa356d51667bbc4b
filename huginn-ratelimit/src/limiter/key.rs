use std::net::SocketAddr;

use crate::config::LimitBy;

/// Extract rate limiting key from request context
///
/// # Arguments
/// * `limit_by` - Key extraction strategy
/// * `peer` - Client socket address
/// * `route` - Matched route (prefix or endpoint pattern)
/// * `header_name` - Custom header name (for `LimitBy::Header`)
/// * `headers` - HTTP request headers
///
/// # Returns
/// Backend key for the client's limiter
pub fn extract_rate_limit_key(
    limit_by: LimitBy,
    peer: SocketAddr,
    route: &str,
    header_name: Option<&str>,
    headers: &http::HeaderMap,
) -> String {
    match limit_by {
        LimitBy::Ip => client_ip(peer, headers),
        LimitBy::Header => header_name
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            // Fall back to IP if header not found
            .unwrap_or_else(|| client_ip(peer, headers)),
        LimitBy::Route => route.to_string(),
        LimitBy::Combined => format!("{}:{route}", client_ip(peer, headers)),
    }
}

/// First `X-Forwarded-For` hop, or the peer address.
fn client_ip(peer: SocketAddr, headers: &http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
