//! Route lookup and forwarding decisions.
//!
//! # Responsibilities
//! - Store compiled rules in declaration order
//! - Resolve a request path to a forwarding decision or an explicit no-match
//! - Compose the outgoing URI for a decision
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan, first match wins
//! - A rewrite error is returned, never silently forwarded

use axum::http::{header::HeaderValue, Uri};
use url::Url;

use crate::config::{ProxyRuleConfig, RewriteConfig};
use crate::error::{ProxyError, RewriteError, RouteError};
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::rewrite::PathRewrite;

/// A single proxy rule.
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: PathPrefixMatcher,
    target: Url,
    upgrade: bool,
    change_origin: bool,
    rewrite: Option<PathRewrite>,
}

impl Rule {
    /// Create a rule forwarding `prefix` to `target` with every flag off.
    pub fn new(prefix: impl Into<String>, target: &str) -> Result<Self, RouteError> {
        Ok(Self {
            matcher: PathPrefixMatcher::new(prefix)?,
            target: parse_target(target)?,
            upgrade: false,
            change_origin: false,
            rewrite: None,
        })
    }

    pub fn from_config(config: &ProxyRuleConfig) -> Result<Self, RouteError> {
        let rewrite = match &config.rewrite {
            None => None,
            Some(RewriteConfig::StripPrefix { prefix }) => Some(PathRewrite::strip_prefix(
                prefix.clone().unwrap_or_else(|| config.prefix.clone()),
            )),
            Some(RewriteConfig::Regex { pattern, replacement }) => {
                Some(PathRewrite::regex(pattern, replacement.clone())?)
            }
        };

        let mut rule = Rule::new(config.prefix.clone(), &config.target)?
            .with_upgrade(config.ws)
            .with_change_origin(config.change_origin);
        rule.rewrite = rewrite;
        Ok(rule)
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn with_change_origin(mut self, change_origin: bool) -> Self {
        self.change_origin = change_origin;
        self
    }

    pub fn with_rewrite(mut self, rewrite: PathRewrite) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    pub fn change_origin(&self) -> bool {
        self.change_origin
    }

    pub fn rewrite(&self) -> Option<&PathRewrite> {
        self.rewrite.as_ref()
    }

    /// `host[:port]` of the target, as sent in a rewritten Host header.
    pub fn target_authority(&self) -> String {
        let host = self.target.host_str().unwrap_or_default();
        match self.target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

fn parse_target(target: &str) -> Result<Url, RouteError> {
    let url = Url::parse(target).map_err(|source| RouteError::InvalidTarget {
        target: target.to_string(),
        source,
    })?;
    if url.scheme() != "http" {
        return Err(RouteError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(RouteError::MissingHost(target.to_string()));
    }
    Ok(url)
}

/// Host header policy for a forwarded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostHeader {
    /// Replace Host with the target's authority.
    Target(String),
    /// Keep the client's Host header.
    Preserve,
}

impl HostHeader {
    /// The Host value to send, given the client's original one.
    pub fn resolve(&self, original: Option<&HeaderValue>) -> Option<HeaderValue> {
        match self {
            HostHeader::Target(authority) => HeaderValue::from_str(authority).ok(),
            HostHeader::Preserve => original.cloned(),
        }
    }
}

/// Scheme of the outgoing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamScheme {
    Http,
    WebSocket,
}

/// Outcome of a successful route lookup.
#[derive(Debug, Clone)]
pub struct ForwardDecision<'a> {
    rule: &'a Rule,
    final_path: String,
    upgrade_requested: bool,
}

impl<'a> ForwardDecision<'a> {
    pub fn rule(&self) -> &'a Rule {
        self.rule
    }

    pub fn target(&self) -> &'a Url {
        &self.rule.target
    }

    /// Path sent upstream, after any rewrite.
    pub fn final_path(&self) -> &str {
        &self.final_path
    }

    /// Whether the matched rule allows upgrade forwarding.
    pub fn forward_as_upgrade(&self) -> bool {
        self.rule.upgrade
    }

    /// Whether this request becomes a tunnel: the rule allows upgrades AND
    /// the client asked for one. Anything else is forwarded as plain HTTP.
    pub fn tunnel(&self) -> bool {
        self.rule.upgrade && self.upgrade_requested
    }

    pub fn host_header(&self) -> HostHeader {
        if self.rule.change_origin {
            HostHeader::Target(self.rule.target_authority())
        } else {
            HostHeader::Preserve
        }
    }

    /// Absolute URI for the upstream request.
    ///
    /// The target's own base path is prepended to the final path and the
    /// client's query string is carried over unchanged.
    pub fn upstream_uri(&self, query: Option<&str>, scheme: UpstreamScheme) -> Result<Uri, ProxyError> {
        let scheme = match scheme {
            UpstreamScheme::Http => "http",
            UpstreamScheme::WebSocket => "ws",
        };
        let base = self.rule.target.path().trim_end_matches('/');

        let mut uri = format!(
            "{}://{}{}{}",
            scheme,
            self.rule.target_authority(),
            base,
            self.final_path
        );
        if let Some(query) = query {
            uri.push('?');
            uri.push_str(query);
        }

        uri.parse::<Uri>()
            .map_err(|_| ProxyError::InvalidUpstreamUri(uri))
    }
}

/// Ordered, immutable set of proxy rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<Rule>,
}

impl RouteTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        for (index, rule) in rules.iter().enumerate() {
            if rules[..index].iter().any(|earlier| earlier.prefix() == rule.prefix()) {
                tracing::warn!(
                    prefix = %rule.prefix(),
                    index,
                    "Proxy rule is shadowed by an earlier rule with the same prefix"
                );
            }
        }
        Self { rules }
    }

    /// Compile rules from configuration, preserving declaration order.
    pub fn from_config(configs: &[ProxyRuleConfig]) -> Result<Self, RouteError> {
        let rules = configs
            .iter()
            .map(Rule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Resolve a request path.
    ///
    /// `Ok(None)` means no rule matched and the request is served locally.
    pub fn resolve(&self, path: &str, upgrade: bool) -> Result<Option<ForwardDecision<'_>>, RewriteError> {
        let Some(rule) = self.rules.iter().find(|rule| rule.matcher.matches(path)) else {
            return Ok(None);
        };

        let final_path = match &rule.rewrite {
            Some(rewrite) => rewrite.apply(path)?,
            None => path.to_string(),
        };

        Ok(Some(ForwardDecision {
            rule,
            final_path,
            upgrade_requested: upgrade,
        }))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    const BACKEND: &str = "http://localhost:8080";

    fn standard_table() -> RouteTable {
        RouteTable::from_config(&ProxyConfig::standard().proxy).unwrap()
    }

    #[test]
    fn ws_paths_forward_as_upgrade_unchanged() {
        let table = standard_table();
        for path in ["/ws", "/ws/chat", "/ws/socket.io/", "/wsx"] {
            let decision = table.resolve(path, true).unwrap().expect("should match");
            assert_eq!(decision.target().as_str(), "http://localhost:8080/");
            assert!(decision.forward_as_upgrade());
            assert!(decision.tunnel());
            assert_eq!(decision.final_path(), path);
            assert_eq!(decision.host_header(), HostHeader::Preserve);
        }
    }

    #[test]
    fn api_paths_strip_prefix_and_rewrite_origin() {
        let table = standard_table();
        for (path, expected) in [("/api/users", "/users"), ("/api/v1/api/x", "/v1/api/x"), ("/api", "/")] {
            let decision = table.resolve(path, false).unwrap().expect("should match");
            assert_eq!(decision.target().as_str(), "http://localhost:8080/");
            assert_eq!(decision.final_path(), expected);
            assert!(!decision.forward_as_upgrade());
            assert_eq!(
                decision.host_header(),
                HostHeader::Target("localhost:8080".into())
            );
        }
    }

    #[test]
    fn unmatched_path_is_served_locally() {
        let table = standard_table();
        assert!(table.resolve("/static/app.js", false).unwrap().is_none());
        assert!(table.resolve("/", false).unwrap().is_none());
        assert!(table.resolve("/v1/api", false).unwrap().is_none());
    }

    #[test]
    fn rewrite_applies_once_then_stops() {
        let table = standard_table();
        let first = table.resolve("/api/foo", false).unwrap().unwrap();
        assert_eq!(first.final_path(), "/foo");

        // Feeding the rewritten path back in must not re-strip anything.
        assert!(table.resolve(first.final_path(), false).unwrap().is_none());
    }

    #[test]
    fn upgrade_on_non_upgrade_rule_is_plain_forward() {
        let table = standard_table();
        let decision = table.resolve("/api/socket", true).unwrap().unwrap();
        assert!(!decision.forward_as_upgrade());
        assert!(!decision.tunnel());
        assert_eq!(decision.final_path(), "/socket");
    }

    #[test]
    fn plain_request_on_upgrade_rule_is_not_tunneled() {
        let table = standard_table();
        let decision = table.resolve("/ws/info", false).unwrap().unwrap();
        assert!(decision.forward_as_upgrade());
        assert!(!decision.tunnel());
    }

    #[test]
    fn declaration_order_decides_overlap() {
        let table = RouteTable::new(vec![
            Rule::new("/api", BACKEND)
                .unwrap()
                .with_rewrite(PathRewrite::strip_prefix("/api")),
            Rule::new("/api/v2", "http://localhost:9090").unwrap(),
        ]);
        let decision = table.resolve("/api/v2/users", false).unwrap().unwrap();
        assert_eq!(decision.rule().prefix(), "/api");
        assert_eq!(decision.final_path(), "/v2/users");

        let reversed = RouteTable::new(vec![
            Rule::new("/api/v2", "http://localhost:9090").unwrap(),
            Rule::new("/api", BACKEND).unwrap(),
        ]);
        let decision = reversed.resolve("/api/v2/users", false).unwrap().unwrap();
        assert_eq!(decision.rule().prefix(), "/api/v2");
        assert_eq!(decision.target().port(), Some(9090));
        assert_eq!(decision.final_path(), "/api/v2/users");
    }

    #[test]
    fn prefix_without_segment_boundary_is_rooted() {
        let table = standard_table();
        let decision = table.resolve("/apix", false).unwrap().expect("should match");
        assert_eq!(decision.rule().prefix(), "/api");
        assert_eq!(decision.final_path(), "/x");

        let uri = decision.upstream_uri(None, UpstreamScheme::Http).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:8080/x");
    }

    #[test]
    fn malformed_rewrite_output_is_an_error() {
        let table = RouteTable::new(vec![Rule::new("/api", BACKEND)
            .unwrap()
            .with_rewrite(PathRewrite::custom(|p| p.replacen("/api/", "/has space/", 1)))]);
        assert_eq!(
            table.resolve("/api/users", false).unwrap_err(),
            RewriteError::InvalidPath("/has space/users".into())
        );
    }

    #[test]
    fn upstream_uri_joins_base_path_and_query() {
        let table = RouteTable::new(vec![Rule::new("/api", "http://127.0.0.1:3000/backend/")
            .unwrap()
            .with_rewrite(PathRewrite::strip_prefix("/api"))]);
        let decision = table.resolve("/api/items", false).unwrap().unwrap();

        let uri = decision.upstream_uri(Some("page=2"), UpstreamScheme::Http).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/backend/items?page=2");

        let ws = decision.upstream_uri(None, UpstreamScheme::WebSocket).unwrap();
        assert_eq!(ws.to_string(), "ws://127.0.0.1:3000/backend/items");
    }

    #[test]
    fn host_header_policy() {
        let original = HeaderValue::from_static("localhost:5173");

        let preserve = HostHeader::Preserve;
        assert_eq!(preserve.resolve(Some(&original)), Some(original.clone()));
        assert_eq!(preserve.resolve(None), None);

        let target = HostHeader::Target("backend:8080".into());
        assert_eq!(
            target.resolve(Some(&original)),
            Some(HeaderValue::from_static("backend:8080"))
        );
    }

    #[test]
    fn invalid_targets_rejected() {
        assert!(matches!(
            Rule::new("/api", "not a url"),
            Err(RouteError::InvalidTarget { .. })
        ));
        assert!(matches!(
            Rule::new("/api", "https://localhost:8443"),
            Err(RouteError::UnsupportedScheme(s)) if s == "https"
        ));
        assert!(matches!(Rule::new("api", BACKEND), Err(RouteError::PrefixWithoutSlash(_))));
    }

    #[test]
    fn concurrent_resolution_is_safe() {
        let table = std::sync::Arc::new(standard_table());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = table.clone();
                std::thread::spawn(move || {
                    let path = format!("/api/item/{}", i);
                    let decision = table.resolve(&path, false).unwrap().unwrap();
                    decision.final_path().to_string()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("/item/{}", i));
        }
    }
}
