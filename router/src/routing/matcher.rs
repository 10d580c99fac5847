use crate::config::RuleConfig;
use crate::error::RouterError;
use crate::routing::method::MethodMask;
use crate::routing::radix_tree::{CompiledRoute, MatchContext, Node};
use arc_swap::ArcSwap;
use regex::Regex;
use std::sync::Arc;

/// Ordered query-parameter collection with first-value lookup.
///
/// Pairs are stored verbatim; no percent-decoding happens here. Callers
/// that decode can feed pairs through `insert` instead of `parse`.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> QueryParams {
        QueryParams::default()
    }

    /// Split a raw query string (`a=1&b=2&flag`) into pairs. A component
    /// without `=` becomes a key with an empty value.
    pub fn parse(raw: &str) -> QueryParams {
        let pairs = raw
            .split('&')
            .filter(|kv| !kv.is_empty())
            .map(|kv| match kv.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (kv.to_string(), String::new()),
            })
            .collect();
        QueryParams { pairs }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// The facts of one request the router needs to classify it. Borrowed from
/// the caller's request context; the router allocates nothing but the
/// capture buffer.
pub struct RouteRequest<'a> {
    /// Method name, canonical uppercase ("GET"). Unknown names match no
    /// route.
    pub method: &'a str,
    /// Request host, optionally with a port, which is stripped before host
    /// rules are consulted.
    pub host: &'a str,
    /// Path bytes exactly as received; no normalization happens here.
    pub path: &'a str,
    pub headers: &'a http::HeaderMap,
    pub queries: &'a QueryParams,
}

/// A successful classification: the winning leaf plus the parameter values
/// captured on the way to it, still borrowing from the request path.
pub struct RouteMatch<'r, 'p> {
    pub route: &'r CompiledRoute,
    values: Vec<&'p str>,
}

impl<'r, 'p> RouteMatch<'r, 'p> {
    pub fn backend(&self) -> &'r str {
        &self.route.backend
    }

    pub fn pattern(&self) -> &'r str {
        &self.route.pattern
    }

    /// Parameter keys of the winning pattern, aligned 1:1 with
    /// `param_values`.
    pub fn param_keys(&self) -> &'r [String] {
        &self.route.param_keys
    }

    pub fn param_values(&self) -> &[&'p str] {
        &self.values
    }

    /// Key/value pairs in pattern declaration order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &'p str)> {
        self.route
            .param_keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn param(&self, key: &str) -> Option<&'p str> {
        self.route
            .param_keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values.get(i).copied())
    }
}

/// One declared host rule: an optional exact host, an optional host regex,
/// and the trie holding the rule's path patterns. A rule with neither host
/// field set matches every host.
#[derive(Debug)]
struct HostRule {
    host: Option<String>,
    host_rex: Option<Regex>,
    root: Node,
}

impl HostRule {
    fn matches_host(&self, host: &str) -> bool {
        if self.host.is_none() && self.host_rex.is_none() {
            return true;
        }
        if let Some(exact) = &self.host {
            if exact == host {
                return true;
            }
        }
        if let Some(rex) = &self.host_rex {
            if rex.is_match(host) {
                return true;
            }
        }
        false
    }
}

/// The router: host rules in declaration order, each owning a compiled
/// trie.
///
/// Built once from rule declarations, then read-only. Lookups borrow the
/// router and the request; any number may run concurrently. Declaration
/// order is the only tie-breaker between host rules, and a rule whose host
/// matches but whose trie yields nothing does not stop the scan.
#[derive(Debug)]
pub struct Router {
    rules: Vec<HostRule>,
}

impl Router {
    /// Compile rule declarations into a router. Any invalid pattern,
    /// duplicate parameter key, or bad regex fails the whole build.
    pub fn new(rules: &[RuleConfig]) -> Result<Router, RouterError> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut route_count = 0usize;

        for rule in rules {
            let host_rex = match rule.host_regexp.as_deref() {
                Some(re) if !re.is_empty() => {
                    Some(Regex::new(re).map_err(|e| RouterError::Regex {
                        pattern: re.to_string(),
                        source: e,
                    })?)
                }
                _ => None,
            };

            let mut root = Node::default();
            for path in &rule.paths {
                tracing::debug!(
                    "routing: compiling route, path={}, backend={}",
                    path.path,
                    path.backend
                );
                let route = CompiledRoute::compile(path)?;
                root.insert(&path.path, route)?;
                route_count += 1;
            }

            compiled.push(HostRule {
                host: rule.host.clone().filter(|h| !h.is_empty()),
                host_rex,
                root,
            });
        }

        tracing::info!(
            "routing: compiled router, rules={}, routes={}",
            compiled.len(),
            route_count
        );

        Ok(Router { rules: compiled })
    }

    /// Classify a request. Host rules are scanned in declaration order;
    /// the first whose trie produces a filter-accepted leaf wins. Returns
    /// `None` when nothing matches; no request can make this fail.
    pub fn find<'r, 'p>(&'r self, req: &RouteRequest<'p>) -> Option<RouteMatch<'r, 'p>> {
        let host = strip_port(req.host);
        let mut ctx = MatchContext {
            method: MethodMask::from_name(req.method),
            headers: req.headers,
            queries: req.queries,
            values: Vec::new(),
        };

        for rule in &self.rules {
            if !rule.matches_host(host) {
                continue;
            }
            if let Some(route) = rule.root.find(req.path, &mut ctx) {
                return Some(RouteMatch {
                    route,
                    values: ctx.values,
                });
            }
        }

        None
    }
}

/// Shared, hot-swappable router handle.
///
/// Builds happen on one writer; `store` publishes the replacement
/// atomically while concurrent `load` callers keep matching lock-free
/// against whichever router they pinned.
pub struct SharedRouter {
    inner: ArcSwap<Router>,
}

impl SharedRouter {
    pub fn new(router: Router) -> SharedRouter {
        SharedRouter {
            inner: ArcSwap::new(Arc::new(router)),
        }
    }

    pub fn load(&self) -> arc_swap::Guard<Arc<Router>> {
        self.inner.load()
    }

    pub fn store(&self, router: Router) {
        self.inner.store(Arc::new(router));
    }
}

/// Drop a port suffix from a request host. Bracketed IPv6 literals keep
/// their address; a bare host with more than one colon is returned
/// unchanged rather than guessed at.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            if rest[end + 1..].starts_with(':') {
                return &rest[..end];
            }
        }
        return host;
    }
    if host.bytes().filter(|&b| b == b':').count() == 1 {
        return host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host);
    }
    host
}
