use http::StatusCode;
use thiserror::Error;

/// Failures of the hosting transport, or of the conversation with it.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport disconnected before the expected event arrived")]
    Disconnected,

    #[error("unsupported scope type: {0}")]
    UnsupportedScope(String),

    #[error("unexpected event in {0} phase")]
    UnexpectedEvent(&'static str),

    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },
}

/// Malformed input and resource limit violations detected while reading a request.
///
/// None of these are fatal: the pipeline maps every variant onto an HTTP status via [`ParseError::status`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid cookie: {reason}")]
    InvalidCookie { reason: String },

    #[error("invalid json body: {reason}")]
    InvalidJson { reason: String },

    #[error("invalid form body: {reason}")]
    InvalidForm { reason: String },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },
}

impl ParseError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_cookie<S: ToString>(str: S) -> Self {
        Self::InvalidCookie { reason: str.to_string() }
    }

    pub fn invalid_json<S: ToString>(str: S) -> Self {
        Self::InvalidJson { reason: str.to_string() }
    }

    pub fn invalid_form<S: ToString>(str: S) -> Self {
        Self::InvalidForm { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    /// The status code a request failing with this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::InvalidHeader { .. }
            | ParseError::InvalidCookie { .. }
            | ParseError::InvalidJson { .. }
            | ParseError::InvalidForm { .. } => StatusCode::BAD_REQUEST,
        }
    }
}
