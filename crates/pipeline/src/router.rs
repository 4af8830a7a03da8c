//! Path routing and method dispatch.
//!
//! Routes are registered on a [`RouterBuilder`] and compiled into an immutable [`Router`]
//! once. A pattern is a regular expression matched against the whole path, where
//! `{name}` stands for one path segment captured as the parameter `name`:
//!
//! ```
//! use micro_pipeline::hook::handler_fn;
//! use micro_pipeline::request::Request;
//! use micro_pipeline::router::{RouteMatch, RouterBuilder};
//! use http::Method;
//! use std::sync::Arc;
//!
//! let router = RouterBuilder::new()
//!     .route("/users/{id}", [Method::GET], Arc::new(handler_fn(|_req: Arc<Request>| async { "user" })))
//!     .route(r"/files/(?P<name>.+)", [Method::GET], Arc::new(handler_fn(|_req: Arc<Request>| async { "file" })))
//!     .build()
//!     .unwrap();
//!
//! let RouteMatch::Found { params, .. } = router.at(&Method::GET, "/users/42") else { panic!() };
//! assert_eq!(params["id"], "42");
//! ```
//!
//! Matching is first match in registration order: the first pattern matching the path
//! decides, and a method it lacks yields [`RouteMatch::MethodNotAllowed`] even when a later
//! pattern would have accepted it.

use crate::hook::RequestHandler;
use http::Method;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

type MethodTable = Vec<(Method, Arc<dyn RequestHandler>)>;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// The mutable registration phase of a [`Router`].
#[derive(Default, Clone)]
pub struct RouterBuilder {
    routes: Vec<(String, MethodTable)>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `methods` on `pattern`.
    ///
    /// An already registered pattern keeps its position; the methods are merged into its
    /// table, replacing the handler of any method registered twice.
    #[must_use]
    pub fn route(
        mut self,
        pattern: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        let pattern = pattern.into();
        let table = match self.routes.iter().position(|(existing, _)| *existing == pattern) {
            Some(index) => &mut self.routes[index].1,
            None => {
                self.routes.push((pattern, Vec::new()));
                let last = self.routes.len() - 1;
                &mut self.routes[last].1
            }
        };

        for method in methods {
            match table.iter_mut().find(|(existing, _)| *existing == method) {
                Some(entry) => entry.1 = Arc::clone(&handler),
                None => table.push((method, Arc::clone(&handler))),
            }
        }
        self
    }

    /// Inserts every route of `other` under `prefix`.
    ///
    /// A prefixed pattern that is already registered has its whole method table replaced.
    #[must_use]
    pub fn mount(mut self, other: RouterBuilder, prefix: &str) -> Self {
        for (pattern, table) in other.routes {
            let pattern = format!("{prefix}{pattern}");
            match self.routes.iter_mut().find(|(existing, _)| *existing == pattern) {
                Some(entry) => entry.1 = table,
                None => self.routes.push((pattern, table)),
            }
        }
        self
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compiles every pattern. The builder stays usable, handlers are shared.
    pub fn build(&self) -> Result<Router, RouterError> {
        let routes = self
            .routes
            .iter()
            .map(|(pattern, table)| {
                let regex = Regex::new(&translate(pattern))
                    .map_err(|source| RouterError::InvalidPattern { pattern: pattern.clone(), source })?;
                Ok(CompiledRoute { pattern: pattern.clone(), regex, methods: table.clone() })
            })
            .collect::<Result<Vec<_>, RouterError>>()?;

        Ok(Router { routes })
    }
}

/// The compiled, immutable route table.
pub struct Router {
    routes: Vec<CompiledRoute>,
}

struct CompiledRoute {
    pattern: String,
    regex: Regex,
    methods: MethodTable,
}

/// Outcome of routing one request.
pub enum RouteMatch<'router> {
    Found { handler: &'router Arc<dyn RequestHandler>, params: HashMap<String, String> },
    /// The path matched but not the method; `allow` lists the registered methods in order.
    MethodNotAllowed { allow: Vec<&'router Method> },
    NotFound,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn at(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let Some((route, captures)) =
            self.routes.iter().find_map(|route| route.regex.captures(path).map(|captures| (route, captures)))
        else {
            debug!(path, "no route matched");
            return RouteMatch::NotFound;
        };

        let Some((_, handler)) = route.methods.iter().find(|(registered, _)| registered == method) else {
            debug!(path, %method, pattern = %route.pattern, "method not allowed");
            return RouteMatch::MethodNotAllowed { allow: methods(&route.methods) };
        };

        let params = route
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|value| (name.to_string(), value.as_str().to_string())))
            .collect();

        debug!(path, %method, pattern = %route.pattern, "route matched");
        RouteMatch::Found { handler, params }
    }
}

fn methods(table: &MethodTable) -> Vec<&Method> {
    table.iter().map(|(method, _)| method).collect()
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.routes.iter().map(|(pattern, table)| (pattern, methods(table)))).finish()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.routes).finish()
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .field("methods", &methods(&self.methods))
            .finish()
    }
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMatch::Found { params, .. } => f.debug_struct("Found").field("params", params).finish_non_exhaustive(),
            RouteMatch::MethodNotAllowed { allow } => f.debug_struct("MethodNotAllowed").field("allow", allow).finish(),
            RouteMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Turns a route pattern into an anchored regular expression.
///
/// `{name}` with an identifier name becomes a named single-segment group; any other brace,
/// such as a `{2,3}` repetition, is left to the regex syntax.
fn translate(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 16);
    regex.push_str("^(?:");

    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        regex.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_identifier(&after[..end]) => {
                regex.push_str("(?P<");
                regex.push_str(&after[..end]);
                regex.push_str(">[^/]+)");
                rest = &after[end + 1..];
            }
            _ => {
                regex.push('{');
                rest = after;
            }
        }
    }
    regex.push_str(rest);

    regex.push_str(")$");
    regex
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::handler_fn;
    use crate::reply::Reply;
    use crate::request::Request;

    fn text_handler(text: &'static str) -> Arc<dyn RequestHandler> {
        Arc::new(handler_fn(move |_req: Arc<Request>| async move { text }))
    }

    async fn invoke(route: RouteMatch<'_>) -> Reply {
        let RouteMatch::Found { handler, .. } = route else { panic!("route not found") };
        handler.invoke(Arc::new(Request::default())).await.unwrap()
    }

    #[test]
    fn test_debug_lists_patterns() {
        let builder = Router::builder()
            .route("/items", [Method::GET, Method::POST], text_handler("items"))
            .route("/items/{id}", [Method::DELETE], text_handler("item"));
        assert_eq!(format!("{builder:?}"), r#"{"/items": [GET, POST], "/items/{id}": [DELETE]}"#);

        let router = builder.build().unwrap();
        assert!(format!("{router:?}").contains("(?P<id>[^/]+)"));
        assert_eq!(format!("{:?}", router.at(&Method::GET, "/nope")), "NotFound");
    }

    #[test]
    fn test_translate() {
        assert_eq!(translate("/users/{id}"), "^(?:/users/(?P<id>[^/]+))$");
        assert_eq!(translate("/a{2,3}/{_x1}"), "^(?:/a{2,3}/(?P<_x1>[^/]+))$");
        assert_eq!(translate("/{"), "^(?:/{)$");
    }

    #[test]
    fn test_params() {
        let router = Router::builder()
            .route("/users/{id}/posts/{post}", [Method::GET], text_handler("post"))
            .build()
            .unwrap();

        let RouteMatch::Found { params, .. } = router.at(&Method::GET, "/users/42/posts/7") else {
            panic!("route not found");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params["id"], "42");
        assert_eq!(params["post"], "7");
    }

    #[test]
    fn test_full_match_only() {
        let router = Router::builder().route("/users", [Method::GET], text_handler("users")).build().unwrap();

        assert!(matches!(router.at(&Method::GET, "/users"), RouteMatch::Found { .. }));
        assert!(matches!(router.at(&Method::GET, "/users/1"), RouteMatch::NotFound));
        assert!(matches!(router.at(&Method::GET, "/api/users"), RouteMatch::NotFound));
        assert!(matches!(router.at(&Method::GET, "/users/1/"), RouteMatch::NotFound));
    }

    #[test]
    fn test_method_not_allowed_lists_methods_in_order() {
        let router = Router::builder()
            .route("/items", [Method::POST], text_handler("create"))
            .route("/items", [Method::GET, Method::PUT], text_handler("read"))
            .build()
            .unwrap();

        let RouteMatch::MethodNotAllowed { allow } = router.at(&Method::DELETE, "/items") else {
            panic!("expected method not allowed");
        };
        assert_eq!(allow, vec![&Method::POST, &Method::GET, &Method::PUT]);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let router = Router::builder()
            .route("/files/{name}", [Method::GET], text_handler("first"))
            .route(r"/files/(?P<path>.+)", [Method::GET, Method::POST], text_handler("second"))
            .build()
            .unwrap();

        assert_eq!(invoke(router.at(&Method::GET, "/files/a.txt")).await, Reply::Text("first".into()));
        assert!(matches!(router.at(&Method::POST, "/files/a.txt"), RouteMatch::MethodNotAllowed { .. }));
        assert_eq!(invoke(router.at(&Method::POST, "/files/a/b.txt")).await, Reply::Text("second".into()));
    }

    #[tokio::test]
    async fn test_reregistration_keeps_position_and_replaces_handler() {
        let router = Router::builder()
            .route("/a", [Method::GET], text_handler("old"))
            .route("/{name}", [Method::GET], text_handler("catch all"))
            .route("/a", [Method::GET], text_handler("new"))
            .build()
            .unwrap();

        assert_eq!(router.len(), 2);
        assert_eq!(invoke(router.at(&Method::GET, "/a")).await, Reply::Text("new".into()));
    }

    #[tokio::test]
    async fn test_mount() {
        let api = Router::builder()
            .route("/users", [Method::GET], text_handler("api users"))
            .route("/status", [Method::POST], text_handler("api status"));
        let router = Router::builder()
            .route("/api/status", [Method::GET], text_handler("root status"))
            .mount(api, "/api")
            .build()
            .unwrap();

        assert_eq!(router.len(), 2);
        assert_eq!(invoke(router.at(&Method::GET, "/api/users")).await, Reply::Text("api users".into()));
        // the mounted table replaced the existing one
        assert!(matches!(router.at(&Method::GET, "/api/status"), RouteMatch::MethodNotAllowed { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = Router::builder().route("/broken/(", [Method::GET], text_handler("x")).build();
        assert!(matches!(result, Err(RouterError::InvalidPattern { pattern, .. }) if pattern == "/broken/("));
    }
}
