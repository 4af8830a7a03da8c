//! The response model and its serialization into gateway frames.

use crate::cookie::Cookie;
use bytes::Bytes;
use http::StatusCode;
use micro_gateway::protocol::{HeaderMap, SendEvent};
use serde::Serialize;
use std::collections::BTreeMap;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// An HTTP response.
///
/// A response is also the value any pipeline stage short-circuits with: a hook or handler
/// returning one replaces whatever response was in progress.
///
/// Error statuses (400 to 599) never go out with an empty body: the canonical reason
/// phrase is used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    cookies: BTreeMap<String, Cookie>,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.set(http::header::CONTENT_TYPE, DEFAULT_CONTENT_TYPE.to_string());

        let mut response = Self { status, headers, cookies: BTreeMap::new(), body: Bytes::new() };
        response.set_body(Bytes::new());
        response
    }

    /// A `200 OK` response carrying `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::OK).with_content_type(mime::APPLICATION_JSON.as_ref()).with_body(body))
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.set_body(body);
        self
    }

    /// Appends a header line. Use [`Response::with_content_type`] to replace the content type.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.set(name, value.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.headers.replace_all(http::header::CONTENT_TYPE, vec![content_type.to_string()]);
        self
    }

    /// Adds a cookie, replacing any previous cookie of the same name.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.insert(cookie.name().to_string(), cookie);
        self
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase of the status, empty for codes without one.
    pub fn description(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        let body = body.into();
        self.body = if body.is_empty() && (self.status.is_client_error() || self.status.is_server_error()) {
            Bytes::from_static(self.description().as_bytes())
        } else {
            body
        };
    }

    /// Serializes into the start frame and the body frame.
    ///
    /// `content-length` is computed from the final body, cookies become one `set-cookie`
    /// line each in name order, and header names are lowercase.
    pub fn into_frames(self) -> [SendEvent; 2] {
        let Self { status, mut headers, cookies, body } = self;

        headers.replace_all(http::header::CONTENT_LENGTH, vec![body.len().to_string()]);
        if !cookies.is_empty() {
            let lines = cookies.values().map(Cookie::to_header_value).collect();
            headers.replace_all(http::header::SET_COOKIE, lines);
        }

        let header_lines = headers
            .iter_all()
            .flat_map(|(name, values)| {
                values.iter().map(move |value| (Bytes::from(name.to_ascii_lowercase()), Bytes::from(value.clone())))
            })
            .collect();

        [SendEvent::ResponseStart { status: status.as_u16(), headers: header_lines }, SendEvent::ResponseBody { body }]
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl From<StatusCode> for Response {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}
