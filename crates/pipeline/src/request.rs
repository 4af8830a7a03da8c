use bytes::Bytes;
use http::Method;
use micro_gateway::codec::FormValue;
use micro_gateway::protocol::{HeaderMap, MultiMap, State};
use serde_json::Value;
use std::collections::HashMap;

/// A request as seen by hooks and handlers.
///
/// The pipeline fills it progressively: identity and query args first, then headers,
/// cookies and the decoded body, finally the path params of the matched route. Only one of
/// `body`, `json` and `form` is populated, depending on the content type.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) params: HashMap<String, String>,
    pub(crate) args: MultiMap<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: HashMap<String, String>,
    pub(crate) body: Bytes,
    pub(crate) json: Value,
    pub(crate) form: MultiMap<FormValue>,
    pub(crate) state: State,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            args: MultiMap::new(),
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            body: Bytes::new(),
            json: Value::Object(serde_json::Map::new()),
            form: MultiMap::new(),
            state: State::new(),
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Named captures of the matched route pattern.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query string arguments.
    pub fn args(&self) -> &MultiMap<String> {
        &self.args
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The last value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The raw body, only filled when the content type has no structured decoder.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The decoded JSON body, an empty object otherwise.
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// The decoded urlencoded or multipart form.
    pub fn form(&self) -> &MultiMap<FormValue> {
        &self.form
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Request scoped state, seeded from the process-wide state. Changes stay with this request.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}
