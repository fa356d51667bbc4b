use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use super::{extract_rate_limit_key, LimitScope, RateLimitDecision, RateLimitManager};
use crate::config::RateLimitConfig;
use crate::telemetry::Metrics;

pub type RespBody = BoxBody<bytes::Bytes, hyper::Error>;

/// Check rate limiting for incoming request.
///
/// Returns:
/// - `None` if request is allowed to proceed
/// - `Some(503 response)` if the route-wide bucket is exhausted
/// - `Some(429 response)` if the client's own bucket is exhausted
pub fn check_rate_limit(
    rate_limit_manager: Option<&Arc<RateLimitManager>>,
    rate_limit_config: &RateLimitConfig,
    route: &str,
    peer: SocketAddr,
    headers: &http::HeaderMap,
    metrics: Option<&Arc<Metrics>>,
) -> Option<Response<RespBody>> {
    let manager = rate_limit_manager?;

    let limit_by = rate_limit_config.limit_by;
    let rate_limit_key = extract_rate_limit_key(
        limit_by,
        peer,
        route,
        rate_limit_config.limit_by_header.as_deref(),
        headers,
    );

    let strategy = limit_by.as_str();
    if let Some(m) = metrics {
        m.record_rate_limit_request(strategy, route);
    }

    match manager.check(&rate_limit_key) {
        RateLimitDecision::Limited { scope, limit, reset_after } => {
            debug!(scope = scope.as_str(), key = %rate_limit_key, "Rate limit exceeded");
            if let Some(m) = metrics {
                m.record_rate_limit_rejection(strategy, route, scope.as_str());
            }

            Some(match scope {
                LimitScope::Route => create_503_response(),
                LimitScope::Client => {
                    create_429_response(limit, reset_after.as_secs_f64().ceil() as u64)
                }
            })
        }
        RateLimitDecision::Allowed { client } => {
            if let Some(result) = client {
                debug!(
                    limit = result.limit(),
                    remaining = result.remaining(),
                    "Rate limit check passed"
                );
            }
            if let Some(m) = metrics {
                m.record_rate_limit_allowed(strategy, route);
            }

            None
        }
    }
}

fn text_body(text: &'static str) -> RespBody {
    Full::new(bytes::Bytes::from(text))
        .map_err(|never| match never {})
        .boxed()
}

fn create_503_response() -> Response<RespBody> {
    let mut resp = Response::new(text_body("Service Unavailable"));
    *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    resp
}

fn create_429_response(limit: u64, reset_after_secs: u64) -> Response<RespBody> {
    let mut resp = Response::new(text_body("Too Many Requests"));
    *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

    let headers = resp.headers_mut();
    headers.insert(
        http::header::HeaderName::from_static("x-rate-limit-limit"),
        http::header::HeaderValue::from(limit),
    );
    headers.insert(
        http::header::HeaderName::from_static("x-rate-limit-remaining"),
        http::header::HeaderValue::from_static("0"),
    );
    headers.insert(
        http::header::HeaderName::from_static("x-ratelimit-reset"),
        http::header::HeaderValue::from(reset_after_secs),
    );

    resp
}
