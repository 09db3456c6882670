//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Establish WebSocket connection to backend
//! - Complete upgrade handshake with client
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Backend is dialed before the client upgrade, so an unreachable backend
//!   is reported as 502 instead of an immediately closed socket
//! - A backend that answers the handshake without `101` has its reply
//!   (status, headers, body) passed back to the client
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Pings are forwarded, pongs are not: each side's socket already answers
//!   the pings it receives

use axum::{
    body::Body,
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::header::{self, HeaderMap, HeaderName},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, protocol::frame::coding::CloseCode},
    MaybeTlsStream, WebSocketStream,
};

use crate::error::ProxyError;
use crate::http::headers::strip_hop_by_hop;
use crate::observability::metrics;
use crate::routing::{ForwardDecision, UpstreamScheme};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Headers tungstenite generates for its own handshake.
const HANDSHAKE: [HeaderName; 6] = [
    header::HOST,
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
];

/// Build the backend handshake request for a tunnel.
pub fn upstream_handshake(
    decision: &ForwardDecision<'_>,
    query: Option<&str>,
    client_headers: &HeaderMap,
) -> Result<tungstenite::handshake::client::Request, ProxyError> {
    let uri = decision.upstream_uri(query, UpstreamScheme::WebSocket)?;
    let target = uri.to_string();
    let mut request = uri
        .into_client_request()
        .map_err(|_| ProxyError::InvalidUpstreamUri(target))?;

    let headers = request.headers_mut();
    for (name, value) in client_headers {
        if !HANDSHAKE.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Some(host) = decision.host_header().resolve(client_headers.get(header::HOST)) {
        headers.insert(header::HOST, host);
    }

    Ok(request)
}

/// Dial the backend, then upgrade the client and relay frames.
pub async fn proxy(
    upgrade: WebSocketUpgrade,
    decision: &ForwardDecision<'_>,
    query: Option<&str>,
    client_headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    let request = upstream_handshake(decision, query, client_headers)?;
    let target = request.uri().to_string();

    let (upstream, response) = match connect_async(request).await {
        Ok(connected) => connected,
        Err(tungstenite::Error::Http(refusal)) => {
            tracing::debug!(upstream = %target, status = %refusal.status(), "Backend refused WebSocket handshake");
            return Err(ProxyError::HandshakeRefused {
                target,
                response: Box::new(refusal_response(refusal)),
            });
        }
        Err(e) => {
            return Err(ProxyError::Upstream {
                target,
                reason: e.to_string(),
            })
        }
    };

    tracing::debug!(upstream = %target, "Backend WebSocket connected");

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    let route = decision.rule().prefix().to_string();
    Ok(upgrade.on_upgrade(move |socket| relay(socket, upstream, route)))
}

/// Turn the backend's non-101 handshake reply into a client response.
fn refusal_response(refusal: tungstenite::http::Response<Option<Vec<u8>>>) -> Response {
    let (mut parts, body) = refusal.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    // The body was read in full; the original framing no longer applies.
    parts.headers.remove(header::TRANSFER_ENCODING);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.unwrap_or_default()))
}

async fn relay(client: WebSocket, upstream: Upstream, route: String) {
    metrics::tunnel_opened(&route);
    tracing::debug!(route = %route, "Tunnel opened");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let Some(message) = to_upstream(message) else {
                continue;
            };
            if upstream_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(Ok(message)) = upstream_rx.next().await {
            let Some(message) = to_client(message) else {
                continue;
            };
            if client_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    metrics::tunnel_closed(&route);
    tracing::debug!(route = %route, "Tunnel closed");
}

fn to_upstream(message: ws::Message) -> Option<tungstenite::Message> {
    let message = match message {
        ws::Message::Text(text) => tungstenite::Message::text(text.as_str().to_owned()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(_) => return None,
        ws::Message::Close(frame) => {
            tungstenite::Message::Close(frame.map(|f| tungstenite::protocol::CloseFrame {
                code: CloseCode::from(f.code),
                reason: f.reason.as_str().to_owned().into(),
            }))
        }
    };
    Some(message)
}

fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    let message = match message {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(_) => return None,
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().to_owned().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    };
    Some(message)
}
