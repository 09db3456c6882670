//! Plain HTTP forwarding.
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Request and response bodies are streamed, never buffered
//! - Hop-by-hop headers never cross the proxy, so an upgrade request that
//!   reaches here goes out as an ordinary request

use axum::{
    body::Body,
    http::{Request, Response, Version},
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::error::ProxyError;
use crate::http::headers::{apply_host, strip_hop_by_hop};
use crate::routing::{ForwardDecision, UpstreamScheme};

pub type HttpClient = Client<HttpConnector, Body>;

/// Build the upstream request for a decision.
pub fn upstream_request(
    request: Request<Body>,
    decision: &ForwardDecision<'_>,
) -> Result<Request<Body>, ProxyError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = decision.upstream_uri(parts.uri.query(), UpstreamScheme::Http)?;
    // The upstream connection is always HTTP/1.1.
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    apply_host(&mut parts.headers, &decision.host_header());

    Ok(Request::from_parts(parts, body))
}

/// Forward `request` to the decision's target.
pub async fn forward(
    client: &HttpClient,
    request: Request<Body>,
    decision: &ForwardDecision<'_>,
) -> Result<Response<Body>, ProxyError> {
    let upstream = upstream_request(request, decision)?;
    let uri = upstream.uri().to_string();

    tracing::debug!(upstream = %uri, "Forwarding request");

    let response = client
        .request(upstream)
        .await
        .map_err(|e| ProxyError::Upstream {
            target: uri,
            reason: e.to_string(),
        })?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
