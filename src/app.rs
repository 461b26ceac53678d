//! The server: route registration, mounting, dispatch and the connection loop.
//!
//! # Examples
//!
//! ```rust,no_run
//! use muxkit::{Options, Server};
//!
//! # async fn run() -> Result<(), muxkit::ServerError> {
//! let mut server = Server::new(Options::default());
//! server.get("/", |ctx| async move {
//!     ctx.string(200, "Hello!");
//!     Ok(())
//! });
//! server.run().await
//! # }
//! ```

use crate::config::ServerConfig;
use crate::context::Context;
use crate::error::{ServerError, ServerResult};
use crate::handler::{panic_message, ErrorFunc, Handler, HandlerResult};
use crate::http::{Body, Method, Request, Response};
use crate::middleware::{Chain, Middleware};
use crate::router::{HandleOptions, Route, RouteNames, RouteTree, Router, StripPrefix};
use crate::session::{LoadAndSave, MemoryStore, SessionManager};
use crate::static_files::StaticFiles;
use crate::templates::{Renderer, TemplateOptions, Templates};
use futures::FutureExt;
use std::future::Future;
use std::io::{self, ErrorKind};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info_span, Instrument, Span};

pub const PUBLIC_PREFIX: &str = "/public";

pub struct Options {
    pub host: String,
    pub port: u16,
    /// Folder served under `/public/`.
    pub public: PathBuf,
    /// Root middleware, outermost first.
    pub middleware: Chain,
    pub routes: Vec<Route>,
    /// Parent span of every request span. Defaults to `server`.
    pub logger: Option<Span>,
    pub log_requests: bool,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub sessions: Option<Arc<SessionManager>>,
    /// Leave session loading and the `Set-Cookie` write to the caller.
    pub disable_load_and_save: bool,
    pub error_func: Option<ErrorFunc>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public: PathBuf::from("./public"),
            middleware: Chain::new(),
            routes: Vec::new(),
            logger: None,
            log_requests: false,
            renderer: None,
            sessions: None,
            disable_load_and_save: false,
            error_func: None,
        }
    }
}

impl Options {
    /// Options for `config`, with an in-memory session store and a template
    /// engine when their sections are present.
    pub fn from_config(config: &ServerConfig) -> Self {
        let sessions = config.session.as_ref().map(|session| {
            let lifetime = Duration::from_secs(session.lifetime_secs);
            Arc::new(
                SessionManager::new(MemoryStore::new(session.max_sessions, lifetime))
                    .cookie_name(session.cookie_name.clone())
                    .lifetime(lifetime)
                    .secure(session.secure),
            )
        });
        let renderer = config.templates.as_ref().map(|templates| {
            let engine: Arc<dyn Renderer> = Arc::new(Templates::new(TemplateOptions {
                root: templates.root.clone(),
                ext: templates.ext.clone(),
            }));
            engine
        });

        Self {
            host: config.host.clone(),
            port: config.port,
            public: config.public.clone(),
            log_requests: config.log_requests,
            disable_load_and_save: config.disable_load_and_save,
            sessions,
            renderer,
            ..Self::default()
        }
    }
}

/// What handlers can reach of the server, shared by all requests once the
/// routes are mounted.
#[derive(Default)]
pub(crate) struct ServerState {
    pub(crate) logger: Option<Span>,
    pub(crate) renderer: Option<Arc<dyn Renderer>>,
    pub(crate) sessions: Option<Arc<SessionManager>>,
    pub(crate) error_func: Option<ErrorFunc>,
    pub(crate) route_names: RouteNames,
}

struct Mounted {
    handler: Arc<dyn Handler>,
    state: Arc<ServerState>,
}

pub struct Server {
    pub host: String,
    pub port: u16,
    pub public: PathBuf,
    router: Router,
    logger: Span,
    log_requests: bool,
    renderer: Option<Arc<dyn Renderer>>,
    sessions: Option<Arc<SessionManager>>,
    disable_load_and_save: bool,
    error_func: Option<ErrorFunc>,
    mounted: Option<Mounted>,
}

impl Server {
    pub fn new(options: Options) -> Self {
        let mut router = Router::with_middleware(options.middleware);
        for route in options.routes {
            router.add(route);
        }

        Self {
            host: options.host,
            port: options.port,
            public: options.public,
            router,
            logger: options.logger.unwrap_or_else(|| info_span!("server")),
            log_requests: options.log_requests,
            renderer: options.renderer,
            sessions: options.sessions,
            disable_load_and_save: options.disable_load_and_save,
            error_func: options.error_func,
            mounted: None,
        }
    }

    pub fn logger(&self) -> &Span {
        &self.logger
    }

    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.router.middleware(middleware);
        self
    }

    pub fn handle(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.router.handle(pattern, handler);
        self
    }

    pub fn handle_with(&mut self, pattern: &str, handler: impl Handler, options: HandleOptions) -> &mut Self {
        self.router.handle_with(pattern, handler, options);
        self
    }

    pub fn handle_fn<F, Fut>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.handle_fn(pattern, f);
        self
    }

    pub fn handle_fn_with<F, Fut>(&mut self, pattern: &str, f: F, options: HandleOptions) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.handle_fn_with(pattern, f, options);
        self
    }

    pub fn get<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.get(path, f);
        self
    }

    pub fn post<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.post(path, f);
        self
    }

    pub fn put<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.put(path, f);
        self
    }

    pub fn patch<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.patch(path, f);
        self
    }

    pub fn delete<F, Fut>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.router.delete(path, f);
        self
    }

    /// See [`Router::group`].
    pub fn group<F>(&mut self, prefix: &str, name: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Router),
    {
        self.router.group(prefix, name, build);
        self
    }

    pub fn route_name(&self, name: &str, params: &[&str]) -> String {
        self.router.route_name(name, params)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Mounts the registered routes. Runs once; later calls return `Ok(())`
    /// and later registrations are dropped.
    ///
    /// `/public/` is served from the public folder ahead of the root
    /// middleware chain.
    pub fn route(&mut self) -> ServerResult<()> {
        if self.mounted.is_some() {
            return Ok(());
        }

        let routes = self.router.mount();
        let files: Arc<dyn Handler> = Arc::new(StripPrefix::new(
            PUBLIC_PREFIX,
            Arc::new(StaticFiles::new(self.public.clone())),
        ));
        let mut handler: Arc<dyn Handler> = Arc::new(RouteTree::new(vec![
            (format!("{PUBLIC_PREFIX}/"), files),
            ("/".to_string(), routes),
        ]));

        if let Some(sessions) = &self.sessions {
            if !self.disable_load_and_save {
                let mut chain = Chain::new();
                chain.push(LoadAndSave::new(Arc::clone(sessions)));
                handler = chain.then(handler);
            }
        }

        let state = ServerState {
            logger: Some(self.logger.clone()),
            renderer: self.renderer.clone(),
            sessions: self.sessions.clone(),
            error_func: self.error_func.clone(),
            route_names: self.router.names().clone(),
        };
        self.mounted = Some(Mounted {
            handler,
            state: Arc::new(state),
        });
        Ok(())
    }

    /// Serves one request through the mounted tree.
    ///
    /// Errors escaping the middleware chain become JSON error responses and
    /// panics become 500s. With `log_requests` every request is logged with
    /// its status and duration.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some(mounted) = &self.mounted else {
            let err = ServerError::RoutesNotMounted;
            tracing::warn!(parent: &self.logger, path = %req.path, error = %err, "dispatch before route()");
            return Response::error(ServerError::NotFound);
        };

        req.scope.server = Some(Arc::clone(&mounted.state));
        let started = Instant::now();
        let (uri, method, path) = (req.uri.clone(), req.method, req.path.clone());

        let handler = Arc::clone(&mounted.handler);
        let outcome = AssertUnwindSafe(async move { handler.handle(req).await })
            .catch_unwind()
            .await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => Response::error(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(parent: &self.logger, panic = %message, "panic escaped the middleware chain");
                Response::error(ServerError::PanicError(message))
            }
        };

        if self.log_requests {
            tracing::info!(
                parent: &self.logger,
                method = %method,
                path = %path,
                status = response.status,
                duration = ?started.elapsed(),
                "{}",
                uri
            );
        }
        response
    }

    /// Mounts, binds `host:port` and serves until the process ends.
    pub async fn run(self) -> ServerResult<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(parent: &self.logger, addr = %addr, "listening on");
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Accepts connections until `signal` resolves. Connections already
    /// accepted finish on their own tasks.
    pub async fn serve_with_shutdown<S>(mut self, listener: TcpListener, signal: S) -> ServerResult<()>
    where
        S: Future<Output = ()>,
    {
        self.route()?;
        let server = Arc::new(self);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!(parent: &server.logger, "shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = Arc::clone(&server);
                        let span = info_span!(parent: &server.logger, "connection", %peer);
                        tokio::spawn(
                            async move {
                                if let Err(err) = server.handle_connection(stream).await {
                                    tracing::debug!(error = %err, "connection error");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(err) => tracing::warn!(parent: &server.logger, error = %err, "accept failed"),
                },
            }
        }
    }

    /// Reads one HTTP/1.1 request from `stream`, dispatches it and writes
    /// the response. The connection is closed afterwards.
    pub async fn handle_connection<S>(&self, mut stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;
        if request_line.trim().is_empty() {
            return Ok(());
        }

        let mut parts = request_line.split_whitespace();
        let token = parts.next().unwrap_or_default();
        let target = parts
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "invalid request line"))?
            .to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                break;
            }
            if let Some((key, value)) = line.trim().split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        let Some(method) = Method::parse(token) else {
            let mut response = Response::text("Not Implemented");
            response.status(501);
            drop(reader);
            stream.write_all(&response.to_http_bytes(true)).await?;
            return stream.flush().await;
        };

        let mut req = Request::new(method, &target);
        for (key, value) in &headers {
            req = req.with_header(key, value);
        }

        let length = req
            .get_header("content-length")
            .and_then(|len| len.parse::<u64>().ok())
            .unwrap_or(0);
        if length > 0 {
            let mut data = Vec::new();
            (&mut reader).take(length).read_to_end(&mut data).await?;
            req.body = Body {
                content_type: req.content_type().to_string(),
                data,
            };
        }
        drop(reader);

        let response = self.dispatch(req).await;
        stream
            .write_all(&response.to_http_bytes(method != Method::HEAD))
            .await?;
        stream.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::duplex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_requests_emits_one_event_per_request() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut server = Server::new(Options {
                    log_requests: true,
                    ..Options::default()
                });
                server.get("/ping", |ctx| async move {
                    ctx.string(202, "pong");
                    Ok(())
                });
                server.route().unwrap();
                server.dispatch(Request::new(Method::GET, "/ping?x=1")).await;
            });
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let events: Vec<&str> = output.lines().filter(|line| line.contains("status=")).collect();
        assert_eq!(events.len(), 1, "{output}");
        assert!(events[0].contains("status=202"));
        assert!(events[0].contains("duration="));
        assert!(events[0].contains("method=GET"));
        assert!(events[0].contains("/ping?x=1"));
    }

    #[tokio::test]
    async fn dispatch_before_route_is_not_found() {
        let server = Server::new(Options::default());
        let response = server.dispatch(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn options_routes_are_registered() {
        let route = Route::new("GET /hello", crate::handler::handler_fn(|ctx: Context| async move {
            ctx.string(200, "hi");
            Ok(())
        }))
        .name("hello");
        let mut server = Server::new(Options {
            routes: vec![route],
            ..Options::default()
        });
        server.route().unwrap();

        assert_eq!(server.route_name("hello", &[]), "/hello");
        let response = server.dispatch(Request::new(Method::GET, "/hello")).await;
        assert_eq!(response.body_string(), "hi");
    }

    #[tokio::test]
    async fn connection_round_trip_and_head() {
        let mut server = Server::new(Options::default());
        server.get("/ping", |ctx| async move {
            ctx.string(200, "pong");
            Ok(())
        });
        server.route().unwrap();

        let (mut client, conn) = duplex(4096);
        let serve = server.handle_connection(conn);
        let (result, raw) = tokio::join!(serve, async {
            client.write_all(b"HEAD /ping HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
            let mut raw = Vec::new();
            client.read_to_end(&mut raw).await.unwrap();
            String::from_utf8(raw).unwrap()
        });
        result.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("content-length: 4\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }
}
