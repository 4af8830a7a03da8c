//! Coercion of handler and hook return values into responses.
//!
//! Handlers return anything implementing [`IntoReply`]; the pipeline turns the resulting
//! [`Reply`] into a [`Response`]:
//!
//! | value                         | response                                       |
//! |-------------------------------|------------------------------------------------|
//! | `StatusCode` / `u16`          | that status, body = reason phrase              |
//! | `String` / `&'static str`     | 200, UTF-8 body                                |
//! | `Bytes` / `Vec<u8>`           | 200, raw body                                  |
//! | `serde_json::Value` / `Map`   | 200, `application/json`; JSON `null` is a 204  |
//! | [`Response`]                  | passed through                                 |
//! | `()` / `None`                 | 204                                            |
//!
//! `Result<T, E>` uses whichever side it holds, so `Err(Response)` short-circuits naturally.

use crate::error::AppError;
use crate::response::Response;
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// A coerced return value, see the [module docs](self).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(u16),
    Text(String),
    Bytes(Bytes),
    Json(Value),
    Response(Response),
    Empty,
}

impl Reply {
    /// Serializes `value` into a JSON reply.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Reply::Json)
    }

    /// Builds the response.
    ///
    /// A status code outside `100..=999` cannot be expressed and is reported as an
    /// application failure.
    pub fn into_response(self) -> Result<Response, AppError> {
        let response = match self {
            Reply::Status(code) => {
                let status = StatusCode::from_u16(code).map_err(|_invalid| AppError::InvalidStatus(code))?;
                let response = Response::new(status);
                let description = response.description();
                response.with_body(description)
            }
            Reply::Text(text) => Response::new(StatusCode::OK).with_body(text),
            Reply::Bytes(bytes) => Response::new(StatusCode::OK).with_body(bytes),
            Reply::Json(Value::Null) | Reply::Empty => Response::new(StatusCode::NO_CONTENT),
            Reply::Json(value) => Response::new(StatusCode::OK)
                .with_content_type(mime::APPLICATION_JSON.as_ref())
                .with_body(value.to_string()),
            Reply::Response(response) => response,
        };
        Ok(response)
    }
}

/// Types that handlers and hooks may return.
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl<T: IntoReply, E: IntoReply> IntoReply for Result<T, E> {
    fn into_reply(self) -> Reply {
        match self {
            Ok(t) => t.into_reply(),
            Err(e) => e.into_reply(),
        }
    }
}

/// `None` is an empty 204 reply.
impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Reply {
        match self {
            Some(t) => t.into_reply(),
            None => Reply::Empty,
        }
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        Reply::Empty
    }
}

impl IntoReply for StatusCode {
    fn into_reply(self) -> Reply {
        Reply::Status(self.as_u16())
    }
}

impl IntoReply for u16 {
    fn into_reply(self) -> Reply {
        Reply::Status(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply {
        Reply::Text(self)
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply {
        Reply::Text(self.to_string())
    }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Reply {
        Reply::Bytes(self)
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Reply {
        Reply::Bytes(Bytes::from(self))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Reply {
        match self {
            Value::Null => Reply::Empty,
            value => Reply::Json(value),
        }
    }
}

impl IntoReply for serde_json::Map<String, Value> {
    fn into_reply(self) -> Reply {
        Reply::Json(Value::Object(self))
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply {
        Reply::Response(self)
    }
}
