//! Development server front door: prefix-routed reverse proxy with
//! WebSocket passthrough, path rewriting, and local static fallback.

pub mod config;
pub mod define;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{ForwardDecision, RouteTable, Rule};
