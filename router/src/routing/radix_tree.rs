use crate::config::{KeyMatcher, PathConfig};
use crate::error::RouterError;
use crate::routing::matcher::QueryParams;
use crate::routing::method::MethodMask;
use regex::Regex;

/// Node kind in the radix trie. The discriminant indexes the child-bucket
/// array on every node and is also the match precedence: static edges are
/// tried before regex params, regex params before plain params, and the
/// catch-all last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NodeKind {
    #[default]
    Static = 0, // /home
    Regex = 1,    // /{id:[0-9]+}
    Param = 2,    // /{user}
    CatchAll = 3, // /api/v1/*
}

const NODE_KINDS: usize = 4;

const KIND_ORDER: [NodeKind; NODE_KINDS] = [
    NodeKind::Static,
    NodeKind::Regex,
    NodeKind::Param,
    NodeKind::CatchAll,
];

/// One parsed pattern segment. `ps`/`pe` are byte offsets of the dynamic
/// part inside the pattern slice that was scanned; for a static segment
/// `pe` covers the whole input.
#[derive(Debug)]
struct Segment {
    kind: NodeKind,
    key: String,
    rexpat: String,
    tail: u8,
    ps: usize,
    pe: usize,
}

impl Segment {
    fn static_span(len: usize) -> Segment {
        Segment {
            kind: NodeKind::Static,
            key: String::new(),
            rexpat: String::new(),
            tail: 0,
            ps: 0,
            pe: len,
        }
    }
}

/// Scan the next segment of a pattern suffix.
///
/// A segment is the longest run of the pattern that belongs to one node
/// kind: plain bytes, a `{key}` param, a `{key:regex}` constrained param,
/// or a trailing `*` catch-all. The tail byte is whatever follows the
/// closing brace, defaulting to `/` when the brace ends the pattern.
fn next_segment(pattern: &str) -> Result<Segment, RouterError> {
    let ps = pattern.find('{');
    let ws = pattern.find('*');

    if ps.is_none() && ws.is_none() {
        return Ok(Segment::static_span(pattern.len()));
    }

    if let (Some(p), Some(w)) = (ps, ws) {
        if w < p {
            return Err(RouterError::Pattern {
                pattern: pattern.to_string(),
                reason: "wildcard '*' must be the last segment, use a '{param}' instead"
                    .to_string(),
            });
        }
    }

    if let Some(ps) = ps {
        let bytes = pattern.as_bytes();

        // Read to the closing brace, counting nested opens and closes.
        let mut depth = 0usize;
        let mut pe = ps;
        for (i, &b) in bytes.iter().enumerate().skip(ps) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        pe = i;
                        break;
                    }
                }
                _ => {}
            }
        }
        if pe == ps {
            return Err(RouterError::Pattern {
                pattern: pattern.to_string(),
                reason: "param closing delimiter '}' is missing".to_string(),
            });
        }

        let body = &pattern[ps + 1..pe];
        let pe = pe + 1;
        let tail = if pe < bytes.len() { bytes[pe] } else { b'/' };

        let (key, rexpat, kind) = match body.split_once(':') {
            Some((key, rex)) => (key, rex, NodeKind::Regex),
            None => (body, "", NodeKind::Param),
        };
        if key.is_empty() {
            return Err(RouterError::Pattern {
                pattern: pattern.to_string(),
                reason: "param key must not be empty".to_string(),
            });
        }

        let rexpat = anchor_regex(rexpat);

        return Ok(Segment {
            kind,
            key: key.to_string(),
            rexpat,
            tail,
            ps,
            pe,
        });
    }

    let ws = ws.expect("either '{' or '*' is present");
    if ws < pattern.len() - 1 {
        return Err(RouterError::Pattern {
            pattern: pattern.to_string(),
            reason: "wildcard '*' must be the last character, use a '{param}' instead"
                .to_string(),
        });
    }

    Ok(Segment {
        kind: NodeKind::CatchAll,
        key: "*".to_string(),
        rexpat: String::new(),
        tail: 0,
        ps: ws,
        pe: pattern.len(),
    })
}

/// Wrap a regex source with `^...$`. Already-anchored ends are left alone,
/// so anchoring is idempotent. The empty source stays empty.
fn anchor_regex(rexpat: &str) -> String {
    if rexpat.is_empty() {
        return String::new();
    }
    let mut anchored = String::with_capacity(rexpat.len() + 2);
    if !rexpat.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(rexpat);
    if !rexpat.ends_with('$') {
        anchored.push('$');
    }
    anchored
}

/// Collect the parameter keys of a pattern in declaration order. Param and
/// regex segments contribute their key, a catch-all contributes `*`.
pub(crate) fn pattern_param_keys(pattern: &str) -> Result<Vec<String>, RouterError> {
    let mut keys: Vec<String> = Vec::new();
    let mut rest = pattern;
    loop {
        let seg = next_segment(rest)?;
        if seg.kind == NodeKind::Static {
            return Ok(keys);
        }
        if keys.iter().any(|k| *k == seg.key) {
            return Err(RouterError::DuplicateParamKey {
                pattern: pattern.to_string(),
                key: seg.key,
            });
        }
        keys.push(seg.key);
        rest = &rest[seg.pe..];
    }
}

/// Length of the shared byte prefix of two strings, backed off to a char
/// boundary so the result is always a valid split point.
fn longest_prefix(a: &str, b: &str) -> usize {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let max = ab.len().min(bb.len());
    let mut i = 0;
    while i < max && ab[i] == bb[i] {
        i += 1;
    }
    while i > 0 && !a.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// A header or query predicate, compiled once at build time.
///
/// Holds a fixed value set, a regex, or both. The two evaluation modes
/// mirror the route-level semantics: `holds_all` requires every configured
/// constraint to pass, `holds_any` passes on the first hit.
#[derive(Debug)]
pub(crate) struct KeyPredicate {
    key: String,
    values: Vec<String>,
    rex: Option<Regex>,
}

impl KeyPredicate {
    fn compile(matcher: &KeyMatcher) -> Result<KeyPredicate, RouterError> {
        let rex = match matcher.regexp.as_deref() {
            Some(re) if !re.is_empty() => Some(Regex::new(re).map_err(|e| RouterError::Regex {
                pattern: re.to_string(),
                source: e,
            })?),
            _ => None,
        };
        Ok(KeyPredicate {
            key: matcher.key.clone(),
            values: matcher.values.clone(),
            rex,
        })
    }

    fn holds_all(&self, value: &str) -> bool {
        if !self.values.is_empty() && !self.values.iter().any(|v| v == value) {
            return false;
        }
        if let Some(rex) = &self.rex {
            if !rex.is_match(value) {
                return false;
            }
        }
        true
    }

    fn holds_any(&self, value: &str) -> bool {
        if self.values.iter().any(|v| v == value) {
            return true;
        }
        match &self.rex {
            Some(rex) => rex.is_match(value),
            None => false,
        }
    }
}

/// A compiled leaf route. Everything needed at match time is resolved here
/// at build time: the method bitmask, predicate regexes, and the parameter
/// keys the pattern declares (used to label captured values on a hit).
#[derive(Debug)]
pub struct CompiledRoute {
    /// Original pattern string, kept for diagnostics.
    pub pattern: String,
    /// Opaque backend handle returned to the caller on a match.
    pub backend: String,
    /// Parameter keys in pattern order; `*` for a trailing catch-all.
    pub param_keys: Vec<String>,
    methods: MethodMask,
    headers: Vec<KeyPredicate>,
    queries: Vec<KeyPredicate>,
    match_all_headers: bool,
}

impl CompiledRoute {
    pub(crate) fn compile(cfg: &PathConfig) -> Result<CompiledRoute, RouterError> {
        let param_keys = pattern_param_keys(&cfg.path)?;

        let methods = if cfg.methods.is_empty() {
            MethodMask::ALL
        } else {
            let mut mask = MethodMask::NONE;
            for name in &cfg.methods {
                let bit = MethodMask::from_name(name);
                if bit.is_empty() {
                    tracing::warn!(
                        "routing: unknown method '{}' on pattern '{}' ignored",
                        name,
                        cfg.path
                    );
                }
                mask = mask | bit;
            }
            mask
        };

        let headers = cfg
            .headers
            .iter()
            .map(KeyPredicate::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let queries = cfg
            .queries
            .iter()
            .map(KeyPredicate::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledRoute {
            pattern: cfg.path.clone(),
            backend: cfg.backend.clone(),
            param_keys,
            methods,
            headers,
            queries,
            match_all_headers: cfg.match_all_headers,
        })
    }

    /// Method, header, and query tests against the request. All three must
    /// pass for the leaf to be accepted.
    fn accepts(&self, ctx: &MatchContext<'_, '_>) -> bool {
        if !self.methods.intersects(ctx.method) {
            return false;
        }
        if !self.headers.is_empty() && !self.match_headers(ctx.headers) {
            return false;
        }
        if !self.queries.is_empty() && !self.match_queries(ctx.queries) {
            return false;
        }
        true
    }

    fn match_headers(&self, headers: &http::HeaderMap) -> bool {
        if self.match_all_headers {
            self.headers
                .iter()
                .all(|p| p.holds_all(header_value(headers, &p.key)))
        } else {
            self.headers
                .iter()
                .any(|p| p.holds_any(header_value(headers, &p.key)))
        }
    }

    // Queries always use all-of semantics, there is no any-of mode.
    fn match_queries(&self, queries: &QueryParams) -> bool {
        self.queries
            .iter()
            .all(|p| p.holds_all(queries.get(&p.key).unwrap_or("")))
    }
}

/// A missing header participates in predicate checks as the empty string.
fn header_value<'h>(headers: &'h http::HeaderMap, key: &str) -> &'h str {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Per-lookup state threaded through the trie walk: the request facts the
/// leaf filter needs, and the capture buffer that backtracking rewinds.
pub(crate) struct MatchContext<'req, 'p> {
    pub(crate) method: MethodMask,
    pub(crate) headers: &'req http::HeaderMap,
    pub(crate) queries: &'req QueryParams,
    pub(crate) values: Vec<&'p str>,
}

/// A node of the compressed radix trie.
///
/// Static nodes carry the literal prefix their edge consumes. Dynamic
/// nodes (param, regex, catch-all) consume up to their tail byte instead;
/// their `prefix` is the pattern text (or the anchored regex source for a
/// regex node ending the pattern, which is what sibling deduplication
/// compares against).
#[derive(Debug, Default)]
pub(crate) struct Node {
    kind: NodeKind,
    /// First byte of `prefix` for static nodes, `{` or `*` otherwise.
    label: u8,
    /// Byte that ends a dynamic segment in the input. Unused on static
    /// nodes.
    tail: u8,
    prefix: String,
    rex: Option<Regex>,
    /// Child buckets indexed by `NodeKind`; the index order is the match
    /// precedence.
    children: [Vec<Node>; NODE_KINDS],
    routes: Vec<CompiledRoute>,
}

/// Keep a bucket sorted by label, then push a `/`-tailed dynamic child to
/// the end: it consumes up to end-of-input and must be tried only after
/// every narrower tail has failed.
fn sort_bucket(nodes: &mut [Node]) {
    nodes.sort_by_key(|n| n.label);
    for i in (0..nodes.len()).rev() {
        if nodes[i].kind != NodeKind::Static && nodes[i].tail == b'/' {
            let last = nodes.len() - 1;
            nodes.swap(i, last);
            return;
        }
    }
}

/// Binary search of a static bucket by label. Labels are unique within the
/// bucket, so a mismatch at the probe point is a definitive miss.
fn find_edge(nodes: &[Node], label: u8) -> Option<&Node> {
    nodes
        .binary_search_by(|n| n.label.cmp(&label))
        .ok()
        .map(|i| &nodes[i])
}

impl Node {
    fn is_leaf(&self) -> bool {
        !self.routes.is_empty()
    }

    /// Locate an existing child edge compatible with a new segment. Regex
    /// siblings are additionally distinguished by their stored source.
    fn edge_index(&self, kind: NodeKind, label: u8, tail: u8, rexpat: &str) -> Option<usize> {
        self.children[kind as usize].iter().position(|c| {
            c.label == label && c.tail == tail && (kind != NodeKind::Regex || c.prefix == rexpat)
        })
    }

    /// Attach `route` at the node whose accumulated path equals the full
    /// pattern, creating and splitting nodes as needed. Duplicate patterns
    /// accumulate sibling leaves on the same node.
    pub(crate) fn insert(&mut self, search: &str, route: CompiledRoute) -> Result<(), RouterError> {
        if search.is_empty() {
            self.routes.push(route);
            return Ok(());
        }

        let label = search.as_bytes()[0];
        let seg = if label == b'{' || label == b'*' {
            next_segment(search)?
        } else {
            Segment::static_span(search.len())
        };

        let Some(idx) = self.edge_index(seg.kind, label, seg.tail, &seg.rexpat) else {
            let child = Node {
                label,
                tail: seg.tail,
                prefix: search.to_string(),
                ..Node::default()
            };
            return self.add_child(child, Some(route));
        };

        if seg.kind != NodeKind::Static {
            return self.children[seg.kind as usize][idx].insert(&search[seg.pe..], route);
        }

        let bucket = NodeKind::Static as usize;
        let common = longest_prefix(search, &self.children[bucket][idx].prefix);
        if common == self.children[bucket][idx].prefix.len() {
            return self.children[bucket][idx].insert(&search[common..], route);
        }

        // The edge diverges inside its prefix: split it at the shared
        // portion and re-parent the old child under the split node.
        let mut old = std::mem::take(&mut self.children[bucket][idx]);
        let mut split = Node {
            label,
            tail: seg.tail,
            prefix: search[..common].to_string(),
            ..Node::default()
        };
        old.label = old.prefix.as_bytes()[common];
        old.prefix = old.prefix[common..].to_string();
        split.add_child(old, None)?;

        let rest = &search[common..];
        if rest.is_empty() {
            split.routes.push(route);
        } else {
            let sub = Node {
                label: rest.as_bytes()[0],
                prefix: rest.to_string(),
                ..Node::default()
            };
            split.add_child(sub, Some(route))?;
        }
        self.children[bucket][idx] = split;
        Ok(())
    }

    /// Add a freshly created child whose prefix is an arbitrary pattern
    /// suffix. Mixed prefixes are subdivided recursively: a leading param
    /// gets its trailing static text as a static child, a leading static
    /// run gets the following param as its child. When `route` is given it
    /// lands on the deepest node created.
    fn add_child(
        &mut self,
        mut child: Node,
        mut route: Option<CompiledRoute>,
    ) -> Result<(), RouterError> {
        let search = child.prefix.clone();
        let seg = next_segment(&search)?;

        if seg.kind != NodeKind::Static {
            if seg.ps == 0 {
                // The suffix starts with the dynamic segment itself.
                child.kind = seg.kind;
                if seg.kind == NodeKind::Regex {
                    let rex = Regex::new(&seg.rexpat).map_err(|e| RouterError::Regex {
                        pattern: seg.rexpat.clone(),
                        source: e,
                    })?;
                    child.prefix = seg.rexpat.clone();
                    child.rex = Some(rex);
                }
                child.tail = seg.tail;
                if seg.pe != search.len() {
                    // Adjacent dynamic segments cannot occur, so whatever
                    // follows begins with static text.
                    child.prefix = search[..seg.pe].to_string();
                    let rest = &search[seg.pe..];
                    let next = Node {
                        label: rest.as_bytes()[0],
                        prefix: rest.to_string(),
                        ..Node::default()
                    };
                    child.add_child(next, route.take())?;
                }
            } else {
                // Static run first, then the dynamic segment under it.
                child.kind = NodeKind::Static;
                child.prefix = search[..seg.ps].to_string();
                child.rex = None;
                let rest = &search[seg.ps..];
                let next = Node {
                    kind: seg.kind,
                    label: rest.as_bytes()[0],
                    tail: seg.tail,
                    prefix: rest.to_string(),
                    ..Node::default()
                };
                child.add_child(next, route.take())?;
            }
        }

        if let Some(route) = route {
            child.routes.push(route);
        }
        let bucket = child.kind as usize;
        self.children[bucket].push(child);
        sort_bucket(&mut self.children[bucket]);
        Ok(())
    }

    /// First route on this node accepted by the filter, in insertion
    /// order.
    fn match_routes(&self, ctx: &MatchContext<'_, '_>) -> Option<&CompiledRoute> {
        self.routes.iter().find(|r| r.accepts(ctx))
    }

    /// Read-only search for `search` below this node.
    ///
    /// Buckets are visited in precedence order. Param and regex candidates
    /// backtrack: a capture is pushed before descending and popped again
    /// when the subtree yields nothing, so a later sibling can claim the
    /// segment instead.
    pub(crate) fn find<'n, 'p>(
        &'n self,
        search: &'p str,
        ctx: &mut MatchContext<'_, 'p>,
    ) -> Option<&'n CompiledRoute> {
        for kind in KIND_ORDER {
            let bucket = &self.children[kind as usize];
            if bucket.is_empty() {
                continue;
            }

            match kind {
                NodeKind::Static => {
                    if search.is_empty() {
                        continue;
                    }
                    let label = search.as_bytes()[0];
                    let Some(child) = find_edge(bucket, label) else {
                        continue;
                    };
                    if !search.starts_with(child.prefix.as_str()) {
                        continue;
                    }
                    let rest = &search[child.prefix.len()..];
                    if rest.is_empty() && child.is_leaf() {
                        if let Some(route) = child.match_routes(ctx) {
                            return Some(route);
                        }
                    }
                    if let Some(route) = child.find(rest, ctx) {
                        return Some(route);
                    }
                }
                NodeKind::Regex | NodeKind::Param => {
                    if search.is_empty() {
                        continue;
                    }
                    for child in bucket {
                        let p = match find_byte(search, child.tail) {
                            Some(0) if kind == NodeKind::Regex => continue,
                            Some(p) => p,
                            // A '/' tail consumes to end-of-input when the
                            // remainder has no slash at all.
                            None if child.tail == b'/' => search.len(),
                            None => continue,
                        };
                        let value = &search[..p];
                        if kind == NodeKind::Regex {
                            match &child.rex {
                                Some(rex) if rex.is_match(value) => {}
                                _ => continue,
                            }
                        } else if value.contains('/') {
                            // A plain param never crosses a segment
                            // boundary.
                            continue;
                        }

                        let prev = ctx.values.len();
                        ctx.values.push(value);
                        let rest = &search[p..];
                        if rest.is_empty() && child.is_leaf() {
                            if let Some(route) = child.match_routes(ctx) {
                                return Some(route);
                            }
                        }
                        if let Some(route) = child.find(rest, ctx) {
                            return Some(route);
                        }
                        ctx.values.truncate(prev);
                    }
                }
                NodeKind::CatchAll => {
                    // At most one catch-all child can exist on a node.
                    let child = &bucket[0];
                    if let Some(route) = child.match_routes(ctx) {
                        ctx.values.push(search);
                        return Some(route);
                    }
                }
            }
        }

        None
    }
}

fn find_byte(haystack: &str, needle: u8) -> Option<usize> {
    haystack.as_bytes().iter().position(|&b| b == needle)
}
