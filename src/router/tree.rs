//! Dispatch tree built at mount time.
//!
//! Patterns follow `"[METHOD ][HOST]/path"`. Path segments are literals,
//! `{name}` (one non-empty segment), or a final `{name...}` (the rest of the
//! path). A trailing `/` turns the pattern into a subtree that matches every
//! path below it; `{$}` anchors a trailing slash exactly.

use crate::error::ServerError;
use crate::handler::{Handler, HttpResponse};
use crate::http::{Method, Request};
use crate::router::pattern::pattern_parts;
use futures::future::BoxFuture;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest(String),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    method: Option<Method>,
    host: Option<String>,
    segments: Vec<Segment>,
    subtree: bool,
}

impl CompiledPattern {
    pub(crate) fn parse(pattern: &str) -> Result<Self, String> {
        let parts = pattern_parts(pattern);
        if parts.path.is_empty() {
            return Err(format!("invalid route pattern {pattern:?}"));
        }
        let method = match parts.method {
            "" => None,
            token => Some(Method::parse(token).ok_or_else(|| format!("unknown method {token:?}"))?),
        };
        let host = (!parts.host.is_empty()).then(|| parts.host.to_ascii_lowercase());

        let mut path = parts.path;
        let mut subtree = false;
        if let Some(anchored) = path.strip_suffix("{$}") {
            path = anchored;
        } else if path.ends_with('/') {
            subtree = true;
            path = &path[..path.len() - 1];
        }

        let raw: Vec<&str> = path.split('/').skip(1).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, seg) in raw.iter().enumerate() {
            let segment = match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => match name.strip_suffix("...") {
                    Some(rest) if i + 1 == raw.len() && !subtree => Segment::Rest(rest.to_string()),
                    Some(_) => return Err(format!("{{name...}} must end pattern {pattern:?}")),
                    None if name.is_empty() => return Err(format!("empty wildcard in {pattern:?}")),
                    None => Segment::Param(name.to_string()),
                },
                None => Segment::Literal(seg.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            method,
            host,
            segments,
            subtree,
        })
    }

    /// Higher ranks win: host-specific, then exact over subtree, then longer,
    /// then more literal segments.
    fn rank(&self) -> (bool, bool, usize, usize) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        (self.host.is_some(), !self.subtree, self.segments.len(), literals)
    }

    fn allows(&self, method: Method) -> bool {
        match self.method {
            None => true,
            Some(m) => m == method || (m == Method::GET && method == Method::HEAD),
        }
    }

    fn matches_host(&self, host: Option<&str>) -> bool {
        match (&self.host, host) {
            (None, _) => true,
            (Some(expected), Some(host)) => {
                let host = host.rsplit_once(':').map_or(host, |(name, _)| name);
                expected.eq_ignore_ascii_case(host)
            }
            (Some(_), None) => false,
        }
    }

    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let request: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        let mut params = HashMap::new();

        if self.subtree {
            if request.len() <= self.segments.len() {
                return None;
            }
        } else if matches!(self.segments.last(), Some(Segment::Rest(_))) {
            if request.len() < self.segments.len() {
                return None;
            }
        } else if request.len() != self.segments.len() {
            return None;
        }

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if request.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = request.get(i).filter(|v| !v.is_empty())?;
                    params.insert(name.clone(), decode(value));
                }
                Segment::Rest(name) => {
                    let rest = request.get(i..).map(|r| r.join("/")).unwrap_or_default();
                    params.insert(name.clone(), decode(&rest));
                }
            }
        }
        Some(params)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

struct Compiled {
    pattern: CompiledPattern,
    handler: Arc<dyn Handler>,
}

/// Matches requests against mounted patterns, most specific first; ties go
/// to the earliest registration.
pub(crate) struct RouteTree {
    routes: Vec<Compiled>,
}

impl RouteTree {
    pub(crate) fn new(entries: Vec<(String, Arc<dyn Handler>)>) -> Self {
        let mut routes: Vec<Compiled> = entries
            .into_iter()
            .filter_map(|(pattern, handler)| match CompiledPattern::parse(&pattern) {
                Ok(compiled) => Some(Compiled {
                    pattern: compiled,
                    handler,
                }),
                Err(err) => {
                    tracing::error!(pattern = %pattern, error = %err, "dropping route");
                    None
                }
            })
            .collect();
        // Stable: equal ranks keep registration order.
        routes.sort_by_key(|route| Reverse(route.pattern.rank()));
        Self { routes }
    }

    fn lookup(&self, req: &Request) -> Result<(Arc<dyn Handler>, HashMap<String, String>), ServerError> {
        let mut allowed = Vec::new();
        for route in &self.routes {
            if !route.pattern.matches_host(req.host()) {
                continue;
            }
            let Some(params) = route.pattern.match_path(&req.path) else {
                continue;
            };
            if route.pattern.allows(req.method) {
                return Ok((Arc::clone(&route.handler), params));
            }
            if let Some(method) = route.pattern.method {
                if !allowed.contains(&method) {
                    allowed.push(method);
                }
            }
        }

        if allowed.is_empty() {
            Err(ServerError::NotFound)
        } else {
            Err(ServerError::MethodNotAllowed(allowed))
        }
    }
}

impl Handler for RouteTree {
    fn handle(&self, mut req: Request) -> BoxFuture<'static, HttpResponse> {
        match self.lookup(&req) {
            Ok((handler, params)) => {
                req.params.extend(params);
                handler.handle(req)
            }
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}

/// Removes a literal path prefix before delegating, like a mounted sub-tree
/// sees it. Requests outside the prefix are not found.
pub(crate) struct StripPrefix {
    prefix: String,
    inner: Arc<dyn Handler>,
}

impl StripPrefix {
    pub(crate) fn new(prefix: &str, inner: Arc<dyn Handler>) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            inner,
        }
    }
}

impl Handler for StripPrefix {
    fn handle(&self, mut req: Request) -> BoxFuture<'static, HttpResponse> {
        let rest = match req.path.strip_prefix(&self.prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => return Box::pin(async { Err(ServerError::NotFound) }),
        };
        req.path = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
        self.inner.handle(req)
    }
}
