use crate::protocol::{SharedState, State};
use bytes::Bytes;

/// A raw header line as delivered by the transport: `(name, value)` bytes.
pub type RawHeader = (Bytes, Bytes);

/// Describes what an [`Application`](crate::transport::Application) invocation is about.
#[derive(Debug)]
pub enum Scope {
    /// The startup/shutdown conversation of the whole process.
    Lifespan(LifespanScope),
    /// A single HTTP request.
    Http(HttpScope),
    /// Any scope type the application does not understand, e.g. `websocket`.
    Unsupported(String),
}

impl Scope {
    pub fn type_name(&self) -> &str {
        match self {
            Scope::Lifespan(_) => "lifespan",
            Scope::Http(_) => "http",
            Scope::Unsupported(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LifespanScope {
    pub state: SharedState,
}

/// The identity of one request, as parsed by the transport.
#[derive(Debug, Clone)]
pub struct HttpScope {
    pub method: String,
    pub path: String,
    /// The raw, still percent-encoded query string, without the leading `?`.
    pub query_string: Bytes,
    pub headers: Vec<RawHeader>,
    /// Snapshot of the process-wide state taken at connection time.
    pub state: State,
}

impl HttpScope {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query_string: Bytes::new(),
            headers: Vec::new(),
            state: State::default(),
        }
    }

    #[must_use]
    pub fn with_query_string(mut self, query_string: impl Into<Bytes>) -> Self {
        self.query_string = query_string.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }
}

/// One piece of a request body. `more_body == false` marks the last piece.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BodyChunk {
    pub body: Bytes,
    pub more_body: bool,
}

impl BodyChunk {
    pub fn new(body: impl Into<Bytes>, more_body: bool) -> Self {
        Self { body: body.into(), more_body }
    }

    /// The final chunk of a body.
    pub fn last(body: impl Into<Bytes>) -> Self {
        Self::new(body, false)
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        !self.more_body
    }
}

/// Events the application receives from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    Startup,
    Shutdown,
    Body(BodyChunk),
}

impl ReceiveEvent {
    /// Converts the event into a body chunk, `None` for lifespan events.
    pub fn into_body(self) -> Option<BodyChunk> {
        match self {
            ReceiveEvent::Body(chunk) => Some(chunk),
            ReceiveEvent::Startup | ReceiveEvent::Shutdown => None,
        }
    }
}

impl From<BodyChunk> for ReceiveEvent {
    fn from(chunk: BodyChunk) -> Self {
        ReceiveEvent::Body(chunk)
    }
}

/// Events the application sends to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    StartupComplete,
    StartupFailed { message: String },
    ShutdownComplete,
    ShutdownFailed { message: String },
    /// Status line and header lines. Header names are lowercase.
    ResponseStart { status: u16, headers: Vec<RawHeader> },
    ResponseBody { body: Bytes },
}

impl SendEvent {
    /// The wire name of the event type, e.g. `lifespan.startup.complete`.
    pub fn type_name(&self) -> &'static str {
        match self {
            SendEvent::StartupComplete => "lifespan.startup.complete",
            SendEvent::StartupFailed { .. } => "lifespan.startup.failed",
            SendEvent::ShutdownComplete => "lifespan.shutdown.complete",
            SendEvent::ShutdownFailed { .. } => "lifespan.shutdown.failed",
            SendEvent::ResponseStart { .. } => "http.response.start",
            SendEvent::ResponseBody { .. } => "http.response.body",
        }
    }
}
