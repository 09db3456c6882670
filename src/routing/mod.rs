//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, upgrade?)
//!     → table.rs (ordered rule scan)
//!     → matcher.rs (literal prefix test)
//!     → rewrite.rs (optional, first occurrence only)
//!     → Return: ForwardDecision or no-match (serve locally)
//!
//! Table compilation (at startup):
//!     ProxyRuleConfig[]
//!     → Validate prefixes and targets
//!     → Compile rewrites
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Declaration order is precedence: first match wins
//! - No-match is a normal outcome, not an error

pub mod matcher;
pub mod rewrite;
pub mod table;

pub use rewrite::PathRewrite;
pub use table::{ForwardDecision, HostHeader, RouteTable, Rule, UpstreamScheme};
