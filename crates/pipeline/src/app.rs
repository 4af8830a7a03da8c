//! The application: registration surface, lifecycle controller and dispatch pipeline.
//!
//! An [`App`] is assembled with an [`AppBuilder`] and then hosted by a transport through
//! its [`Application`] implementation. The route table is compiled on the lifespan startup
//! event; request scopes are refused until that happened.
//!
//! Each request runs through a fixed sequence of stages: identity, headers, cookies,
//! content decoding, before-hooks, routing and dispatch, after-hooks, serialization. Any
//! stage may short-circuit with a response, after-hooks still see that response.

use crate::cookie::parse_cookie_header;
use crate::error::AppError;
use crate::hook::{AfterHook, BeforeHook, LifespanHook, RequestHandler};
use crate::request::Request;
use crate::response::Response;
use crate::router::{RouteMatch, Router, RouterBuilder};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use micro_gateway::body::BodyReader;
use micro_gateway::codec::{parse_pairs, ContentKind, FormDecoder, JsonDecoder};
use micro_gateway::protocol::{
    GatewayError, HeaderMap, HttpScope, LifespanScope, MultiMap, ParseError, RawHeader, ReceiveEvent, Scope,
    SendEvent, SharedState,
};
use micro_gateway::transport::{Application, EventReceiver, EventSender};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use unicode_normalization::UnicodeNormalization;

/// Default limit of a request body, 1 MiB.
pub const DEFAULT_MAX_CONTENT: usize = 1_048_576;

/// Registers routes, hooks and limits of an [`App`].
pub struct AppBuilder {
    routes: RouterBuilder,
    startup: Vec<Box<dyn LifespanHook>>,
    shutdown: Vec<Box<dyn LifespanHook>>,
    before: Vec<Box<dyn BeforeHook>>,
    after: Vec<Box<dyn AfterHook>>,
    max_content: usize,
}

macro_rules! method_route {
    ($name:ident, $method:expr) => {
        #[must_use]
        pub fn $name<H: RequestHandler + 'static>(self, path: impl Into<String>, handler: H) -> Self {
            self.route(path, [$method], handler)
        }
    };
}

impl AppBuilder {
    fn new() -> Self {
        Self {
            routes: RouterBuilder::new(),
            startup: vec![],
            shutdown: vec![],
            before: vec![],
            after: vec![],
            max_content: DEFAULT_MAX_CONTENT,
        }
    }

    /// Registers `handler` for `methods` on the path pattern `path`.
    ///
    /// Registering a path again merges the methods into its existing table.
    #[must_use]
    pub fn route<H: RequestHandler + 'static>(
        mut self,
        path: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: H,
    ) -> Self {
        self.routes = self.routes.route(path, methods, Arc::new(handler));
        self
    }

    method_route!(get, Method::GET);
    method_route!(head, Method::HEAD);
    method_route!(post, Method::POST);
    method_route!(put, Method::PUT);
    method_route!(delete, Method::DELETE);
    method_route!(connect, Method::CONNECT);
    method_route!(options, Method::OPTIONS);
    method_route!(trace, Method::TRACE);
    method_route!(patch, Method::PATCH);

    #[must_use]
    pub fn startup<H: LifespanHook + 'static>(mut self, hook: H) -> Self {
        self.startup.push(Box::new(hook));
        self
    }

    #[must_use]
    pub fn shutdown<H: LifespanHook + 'static>(mut self, hook: H) -> Self {
        self.shutdown.push(Box::new(hook));
        self
    }

    #[must_use]
    pub fn before<H: BeforeHook + 'static>(mut self, hook: H) -> Self {
        self.before.push(Box::new(hook));
        self
    }

    #[must_use]
    pub fn after<H: AfterHook + 'static>(mut self, hook: H) -> Self {
        self.after.push(Box::new(hook));
        self
    }

    /// Maximum request body size in bytes.
    #[must_use]
    pub fn max_content(mut self, max_content: usize) -> Self {
        self.max_content = max_content;
        self
    }

    /// Merges `other` under `prefix`.
    ///
    /// Its hooks run after the hooks of this app, its routes are registered as
    /// `prefix + path` and the larger body limit of the two is kept.
    #[must_use]
    pub fn mount(mut self, other: AppBuilder, prefix: &str) -> Self {
        self.startup.extend(other.startup);
        self.shutdown.extend(other.shutdown);
        self.before.extend(other.before);
        self.after.extend(other.after);
        self.routes = self.routes.mount(other.routes, prefix);
        self.max_content = self.max_content.max(other.max_content);
        self
    }

    pub fn build(self) -> App {
        App {
            routes: self.routes,
            router: OnceCell::new(),
            startup: self.startup,
            shutdown: self.shutdown,
            before: self.before,
            after: self.after,
            max_content: self.max_content,
        }
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("routes", &self.routes.len())
            .field("max_content", &self.max_content)
            .finish_non_exhaustive()
    }
}

pub struct App {
    routes: RouterBuilder,
    router: OnceCell<Router>,
    startup: Vec<Box<dyn LifespanHook>>,
    shutdown: Vec<Box<dyn LifespanHook>>,
    before: Vec<Box<dyn BeforeHook>>,
    after: Vec<Box<dyn AfterHook>>,
    max_content: usize,
}

/// Why the request stages stopped early.
enum Abort {
    /// Answer with this response, after-hooks still run.
    Respond(Response),
    /// Give up on the request, nothing is sent.
    Fail(AppError),
}

impl From<ParseError> for Abort {
    fn from(e: ParseError) -> Self {
        let status = e.status();
        warn!(cause = %e, status = status.as_u16(), "reject malformed request");
        Abort::Respond(Response::new(status))
    }
}

impl From<GatewayError> for Abort {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Parse { source } => source.into(),
            e => Abort::Fail(e.into()),
        }
    }
}

impl From<AppError> for Abort {
    fn from(e: AppError) -> Self {
        Abort::Fail(e)
    }
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Returns true once the route table has been compiled by a successful startup.
    pub fn is_started(&self) -> bool {
        self.router.get().is_some()
    }

    async fn lifespan(
        &self,
        scope: LifespanScope,
        receive: &mut dyn EventReceiver,
        send: &mut dyn EventSender,
    ) -> Result<(), AppError> {
        loop {
            match receive.receive().await? {
                ReceiveEvent::Startup => {
                    if let Err(e) = self.on_startup(&scope.state).await {
                        error!(cause = %e, "startup failed");
                        send.send(SendEvent::StartupFailed { message: e.to_string() }).await?;
                        return Ok(());
                    }
                    info!("startup complete");
                    send.send(SendEvent::StartupComplete).await?;
                }
                ReceiveEvent::Shutdown => {
                    match run_lifespan_hooks(&self.shutdown, &scope.state).await {
                        Ok(()) => {
                            info!("shutdown complete");
                            send.send(SendEvent::ShutdownComplete).await?;
                        }
                        Err(e) => {
                            error!(cause = %e, "shutdown failed");
                            send.send(SendEvent::ShutdownFailed { message: e.to_string() }).await?;
                        }
                    }
                    return Ok(());
                }
                ReceiveEvent::Body(_) => return Err(GatewayError::UnexpectedEvent("lifespan").into()),
            }
        }
    }

    async fn on_startup(&self, state: &SharedState) -> Result<(), AppError> {
        run_lifespan_hooks(&self.startup, state).await?;

        let router = self.router.get_or_try_init(|| self.routes.build())?;
        info!(routes = router.len(), "route table compiled");
        Ok(())
    }

    async fn http(
        &self,
        scope: HttpScope,
        receive: &mut dyn EventReceiver,
        send: &mut dyn EventSender,
    ) -> Result<(), AppError> {
        let router = self.router.get().ok_or(AppError::NotStarted)?;

        let mut req = Request::new(Method::GET, scope.path.clone());
        req.state = scope.state.clone();

        let response = match self.dispatch(router, &mut req, &scope, receive).await {
            Ok(response) | Err(Abort::Respond(response)) => response,
            Err(Abort::Fail(e)) => {
                match &e {
                    AppError::Gateway(GatewayError::Disconnected) => warn!(path = %scope.path, "client disconnected"),
                    _ => error!(cause = %e, path = %scope.path, "request failed"),
                }
                return Err(e);
            }
        };

        let response = self.run_after_hooks(&mut req, response).await?;
        debug!(method = %req.method, path = %req.path, status = response.status().as_u16(), "send response");

        for frame in response.into_frames() {
            send.send(frame).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        router: &Router,
        req: &mut Request,
        scope: &HttpScope,
        receive: &mut dyn EventReceiver,
    ) -> Result<Response, Abort> {
        req.method = Method::from_bytes(scope.method.as_bytes()).map_err(ParseError::invalid_header)?;
        req.args = parse_args(&scope.query_string)?;
        req.headers = decode_headers(&scope.headers)?;
        if let Some(cookie) = req.headers.get("cookie") {
            req.cookies = parse_cookie_header(cookie)?;
        }

        self.decode_content(req, receive).await?;

        for hook in &self.before {
            if let Some(reply) = hook.before(req).await.map_err(AppError::Handler)? {
                debug!(path = %req.path, "before hook answered the request");
                return Err(Abort::Respond(reply.into_response()?));
            }
        }

        let response = match router.at(&req.method, &req.path) {
            RouteMatch::Found { handler, params } => {
                req.params = params;
                let shared = Arc::new(std::mem::take(req));
                let result = handler.invoke(Arc::clone(&shared)).await;
                *req = Arc::unwrap_or_clone(shared);
                result.map_err(AppError::Handler)?.into_response()?
            }
            RouteMatch::MethodNotAllowed { allow } => {
                let allow = allow.iter().map(|method| method.as_str()).collect::<Vec<_>>().join(", ");
                Response::new(StatusCode::METHOD_NOT_ALLOWED).with_header(http::header::ALLOW, allow)
            }
            RouteMatch::NotFound => Response::new(StatusCode::NOT_FOUND),
        };
        Ok(response)
    }

    async fn decode_content(&self, req: &mut Request, receive: &mut dyn EventReceiver) -> Result<(), Abort> {
        let kind = ContentKind::from_content_type(req.header("content-type"))?;

        if let Some(decoder) = FormDecoder::new(&kind, self.max_content) {
            decoder.decode(receive, &mut req.form).await?;
            return Ok(());
        }

        let mut reader = BodyReader::new(receive);
        match kind {
            ContentKind::Json => {
                req.json = JsonDecoder::new().with_max_size(self.max_content).decode(&mut reader).await?;
            }
            _ if declares_body(&req.headers) => {
                let result = reader.read_to_end(Some(self.max_content)).await;
                // a transport closing before any body bytes arrived sent an empty body
                req.body = match result {
                    Err(GatewayError::Disconnected) if reader.received() == 0 => Bytes::new(),
                    result => result?,
                };
            }
            _ => {}
        }
        Ok(())
    }

    async fn run_after_hooks(&self, req: &mut Request, mut response: Response) -> Result<Response, AppError> {
        for hook in &self.after {
            if let Some(reply) = hook.after(req, &response).await.map_err(AppError::Handler)? {
                debug!(path = %req.path, "after hook replaced the response");
                response = reply.into_response()?;
                break;
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl Application for App {
    type Error = AppError;

    async fn call(
        &self,
        scope: Scope,
        receive: &mut dyn EventReceiver,
        send: &mut dyn EventSender,
    ) -> Result<(), Self::Error> {
        match scope {
            Scope::Lifespan(scope) => self.lifespan(scope, receive, send).await,
            Scope::Http(scope) => self.http(scope, receive, send).await,
            Scope::Unsupported(kind) => {
                error!(scope = %kind, "unsupported scope type");
                Err(GatewayError::UnsupportedScope(kind).into())
            }
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("started", &self.is_started())
            .field("max_content", &self.max_content)
            .finish_non_exhaustive()
    }
}

async fn run_lifespan_hooks(hooks: &[Box<dyn LifespanHook>], state: &SharedState) -> Result<(), AppError> {
    let mut state = state.lock().await;
    for hook in hooks {
        hook.call(&mut state).await.map_err(AppError::Handler)?;
    }
    Ok(())
}

/// Decodes the query string; pairs with an empty value are dropped.
///
/// Escapes that do not decode to UTF-8 make the whole request malformed.
fn parse_args(query: &[u8]) -> Result<MultiMap<String>, ParseError> {
    let pairs = parse_pairs(query)?;
    Ok(pairs.into_iter().filter(|(_, value)| !value.is_empty()).collect())
}

/// Whether the request announces a body, through a non-zero `content-length` or a
/// `transfer-encoding`.
fn declares_body(headers: &HeaderMap) -> bool {
    headers.contains_key("transfer-encoding")
        || headers.get("content-length").and_then(|len| len.trim().parse::<u64>().ok()).is_some_and(|len| len > 0)
}

/// Header names must be ASCII, values UTF-8; values are stored NFC normalized.
fn decode_headers(raw: &[RawHeader]) -> Result<HeaderMap, ParseError> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let name = std::str::from_utf8(name)
            .ok()
            .filter(|name| name.is_ascii())
            .ok_or_else(|| ParseError::invalid_header("header name is not ascii"))?;
        let value = std::str::from_utf8(value).map_err(ParseError::invalid_header)?;
        headers.set(name, value.nfc().collect::<String>());
    }
    Ok(headers)
}
