//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → routing::RouteTable::resolve
//!         no match  → local.rs (static files + define substitution)
//!         tunnel    → websocket.rs (dial backend, upgrade, relay frames)
//!         otherwise → forward.rs (single streamed HTTP/1.1 attempt)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod local;
pub mod server;
pub mod websocket;

pub use headers::X_REQUEST_ID;
pub use server::HttpServer;
