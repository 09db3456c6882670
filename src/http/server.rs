//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dev handler as fallback
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener
//! - Dispatch requests: forward, tunnel, or serve locally

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::define::DefineTable;
use crate::error::{ProxyError, StartupError};
use crate::http::forward::{self, HttpClient};
use crate::http::headers::{is_upgrade_request, request_id};
use crate::http::{local, websocket};
use crate::lifecycle::shutdown;
use crate::observability::metrics::{self, Outcome, LOCAL_ROUTE};
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub defines: Arc<DefineTable>,
    pub client: HttpClient,
    pub root: Option<Arc<PathBuf>>,
}

/// HTTP server for the dev proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    table: Arc<RouteTable>,
}

impl HttpServer {
    /// Compile the route and define tables and build the router.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let table = Arc::new(RouteTable::from_config(&config.proxy)?);
        let defines = Arc::new(DefineTable::new(&config.define)?);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            table: table.clone(),
            defines,
            client,
            root: config.server.root.clone().map(Arc::new),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            table,
        })
    }

    /// Build the Axum router with all middleware layers.
    /// A request still waiting on its upstream past `request_secs` gets 504.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dev_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            plugins = ?self.config.plugins,
            defines = self.config.define.len(),
            root = ?self.config.server.root,
            "HTTP server starting"
        );
        for rule in self.table.rules() {
            tracing::info!(
                prefix = %rule.prefix(),
                target = %rule.target(),
                ws = rule.upgrade(),
                change_origin = rule.change_origin(),
                rewrite = ?rule.rewrite(),
                "Proxy rule"
            );
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main dev handler.
/// Looks up the route table and forwards, tunnels, or serves locally.
async fn dev_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let upgrade = is_upgrade_request(request.headers());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        upgrade,
        "Handling request"
    );

    // 1. Match Route
    let decision = match state.table.resolve(&path, upgrade) {
        Ok(Some(decision)) => decision,
        Ok(None) => {
            let root = state.root.as_deref().map(PathBuf::as_path);
            let response = local::serve(root, &path, &state.defines).await;
            metrics::record_request(LOCAL_ROUTE, Outcome::Local, response.status().as_u16(), start_time);
            return response;
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rewrite produced an invalid path");
            let error = ProxyError::from(e);
            metrics::record_error("unknown", error.kind());
            metrics::record_request("unknown", Outcome::Rejected, error.status_code().as_u16(), start_time);
            return error.into_response();
        }
    };
    let route = decision.rule().prefix().to_string();

    // 2. Tunnel or forward
    let result = if decision.tunnel() {
        let query = request.uri().query().map(str::to_owned);
        let (mut parts, _body) = request.into_parts();
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                tracing::warn!(request_id = %request_id, path = %path, "Malformed WebSocket handshake");
                return rejection.into_response();
            }
        };
        websocket::proxy(upgrade, &decision, query.as_deref(), &parts.headers)
            .await
            .map(|response| (response, Outcome::Tunneled))
    } else {
        forward::forward(&state.client, request, &decision)
            .await
            .map(|response| (response, Outcome::Forwarded))
    };

    match result {
        Ok((response, outcome)) => {
            tracing::debug!(
                request_id = %request_id,
                route = %route,
                upstream_path = %decision.final_path(),
                status = %response.status(),
                outcome = outcome.as_str(),
                "Request proxied"
            );
            metrics::record_request(&route, outcome, response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route, error = %e, "Upstream error");
            metrics::record_error(&route, e.kind());
            metrics::record_request(&route, Outcome::Rejected, e.status_code().as_u16(), start_time);
            e.into_response()
        }
    }
}
