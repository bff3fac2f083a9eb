//! Per-client rate limiting for the HTTP surface.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    GovernorError, GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
};

/// Keys requests by client IP.
///
/// Behind a trusted proxy the address comes from `X-Forwarded-For`,
/// `X-Real-IP` or `Forwarded`; otherwise from the socket peer, which needs
/// the server to be started with connect info.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpKeyExtractor {
    behind_proxy: bool,
}

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if self.behind_proxy {
            SmartIpKeyExtractor.extract(req)
        } else {
            PeerIpKeyExtractor.extract(req)
        }
    }
}

type Layer = GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn build(behind_proxy: bool, per_second: u64, burst_size: u32) -> Layer {
    let governor_conf = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor { behind_proxy })
        .per_second(per_second)
        .burst_size(burst_size)
        .finish()
        .expect("rate limit quota is non-zero");

    GovernorLayer::new(Arc::new(governor_conf))
}

/// Limiter for the public unsubscribe endpoints.
///
/// 5 requests per second with a burst of 50, per client IP. Exceeding it
/// yields `429 Too Many Requests`.
pub fn layer(behind_proxy: bool) -> Layer {
    build(behind_proxy, 5, 50)
}

/// Stricter limiter for operator endpoints.
///
/// 2 requests per second with a burst of 20, per client IP.
pub fn secure_layer(behind_proxy: bool) -> Layer {
    build(behind_proxy, 2, 20)
}
