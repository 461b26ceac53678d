mod names;
mod pattern;
mod tree;

pub use names::RouteNames;
pub use pattern::{pattern_parts, PatternParts};
pub(crate) use tree::{RouteTree, StripPrefix};

use crate::context::Context;
use crate::handler::{handler_fn, Handler, HandlerResult};
use crate::middleware::{Chain, Middleware};
use std::future::Future;
use std::sync::Arc;

/// Per-route registration options.
#[derive(Clone, Default)]
pub struct HandleOptions {
    name: Option<String>,
    middleware: Chain,
}

impl HandleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the route reverse-lookupable through [`Router::route_name`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Wraps only this route's handler.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}

pub fn with_name(name: impl Into<String>) -> HandleOptions {
    HandleOptions::new().name(name)
}

/// A route declared up front, e.g. in server options.
#[derive(Clone)]
pub struct Route {
    pattern: String,
    handler: Arc<dyn Handler>,
    options: HandleOptions,
}

impl Route {
    pub fn new(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            pattern: pattern.into(),
            handler: Arc::new(handler),
            options: HandleOptions::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.name(name);
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.options = self.options.middleware(middleware);
        self
    }
}

/// Route registry.
///
/// Routes and middleware are collected until [`Router::mount`] compiles
/// them into a dispatch tree. After that the registry is frozen: late
/// registrations are logged and dropped.
#[derive(Default)]
pub struct Router {
    routes: Vec<(String, Arc<dyn Handler>)>,
    middlewares: Chain,
    names: RouteNames,
    /// A route was registered with a name, indexed or not.
    has_named: bool,
    mounted: Option<Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_middleware(middlewares: Chain) -> Self {
        Self {
            middlewares,
            ..Self::default()
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Appends a middleware to the root chain. The first one added is the
    /// outermost.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        if self.is_mounted() {
            tracing::error!("routes already mounted, middleware ignored");
            return self;
        }
        self.middlewares.push(middleware);
        self
    }

    pub fn handle(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle_with(pattern, handler, HandleOptions::default())
    }

    pub fn handle_with(&mut self, pattern: &str, handler: impl Handler, options: HandleOptions) -> &mut Self {
        self.add(Route {
            pattern: pattern.to_string(),
            handler: Arc::new(handler),
            options,
        })
    }

    pub fn add(&mut self, route: Route) -> &mut Self {
        let Route {
            pattern,
            handler,
            options,
        } = route;

        if self.is_mounted() {
            tracing::error!(pattern = %pattern, "routes already mounted, route dropped");
            return self;
        }

        if let Some(name) = options.name.as_deref().filter(|n| !n.is_empty()) {
            self.has_named = true;
            let parts = pattern_parts(&pattern);
            if parts.path.is_empty() {
                tracing::warn!(name, pattern = %pattern, "cannot index route name, pattern has no path");
            } else {
                self.names.insert(name, parts.path);
            }
        }

        let handler = if options.middleware.is_empty() {
            handler
        } else {
            options.middleware.then(handler)
        };
        self.routes.push((pattern, handler));
        self
    }

    pub fn handle_fn<F, Fut>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(pattern, handler_fn(f))
    }

    pub fn handle_fn_with<F, Fut>(&mut self, pattern: &str, f: F, options: HandleOptions) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_with(pattern, handler_fn(f), options)
    }

    pub fn get<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_fn(&format!("GET {path}"), f)
    }

    pub fn post<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_fn(&format!("POST {path}"), f)
    }

    pub fn put<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_fn(&format!("PUT {path}"), f)
    }

    pub fn patch<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_fn(&format!("PATCH {path}"), f)
    }

    pub fn delete<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle_fn(&format!("DELETE {path}"), f)
    }

    /// Registers the routes built by `build` under `prefix`.
    ///
    /// The group gets its own middleware chain and sees paths with the
    /// prefix stripped. Named routes inside are indexed as
    /// `"<name>/<route name>"`.
    ///
    /// # Panics
    ///
    /// Panics if the group contains named routes but `name` is empty.
    pub fn group<F>(&mut self, prefix: &str, name: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Router),
    {
        if self.is_mounted() {
            tracing::warn!(prefix, "routes already mounted, group dropped");
            return self;
        }

        let mut sub = Router::new();
        build(&mut sub);

        if sub.has_named && name.is_empty() {
            panic!("group({prefix:?}) has named routes but no group name was provided");
        }
        self.has_named |= sub.has_named;
        for (sub_name, path) in sub.names.iter() {
            self.names
                .insert(&format!("{name}/{sub_name}"), &join_paths(prefix, path));
        }

        let tree: Arc<dyn Handler> = Arc::new(RouteTree::new(sub.routes));
        let subtree = sub.middlewares.then(tree);
        let prefix = prefix.trim_end_matches('/');
        let stripped: Arc<dyn Handler> = Arc::new(StripPrefix::new(prefix, subtree));
        self.routes.push((format!("{prefix}/"), stripped));
        self
    }

    /// Reverse lookup of a named route; see [`RouteNames::resolve`].
    pub fn route_name(&self, name: &str, params: &[&str]) -> String {
        self.names.resolve(name, params)
    }

    pub fn names(&self) -> &RouteNames {
        &self.names
    }

    /// Compiles the registered routes into the dispatch handler, wrapped in
    /// the root middleware chain. Calling it again returns the same handler.
    pub fn mount(&mut self) -> Arc<dyn Handler> {
        if let Some(handler) = &self.mounted {
            return Arc::clone(handler);
        }

        let tree: Arc<dyn Handler> = Arc::new(RouteTree::new(std::mem::take(&mut self.routes)));
        let handler = self.middlewares.then(tree);
        self.mounted = Some(Arc::clone(&handler));
        handler
    }
}

/// Joins and cleans URL paths the way `prefix + path` should read:
/// duplicate slashes, `.` and `..` segments collapse and the result has no
/// trailing slash.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let joined = format!("{prefix}/{path}");
    let mut clean: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                clean.pop();
            }
            seg => clean.push(seg),
        }
    }
    format!("/{}", clean.join("/"))
}
