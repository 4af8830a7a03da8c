//! Incremental content decoders for request bodies.
//!
//! - [`JsonDecoder`]: pulls the body through a [`BodyReader`](crate::body::BodyReader) and
//!   yields the single top-level JSON value
//! - [`UrlencodedDecoder`] / [`MultipartDecoder`]: push based form parsers fed with raw chunks
//! - [`FormDecoder`]: drives a form parser straight from the transport's body events and
//!   enforces the body size limit
//!
//! The decoder for a request is chosen from its `Content-Type` through [`ContentKind`].

mod form_decoder;
mod json_decoder;
mod multipart_decoder;
mod urlencoded_decoder;

pub use form_decoder::FormDecoder;
pub use json_decoder::JsonDecoder;
pub use multipart_decoder::MultipartDecoder;
pub use multipart_decoder::MAX_PART_HEADER_SIZE;
pub use urlencoded_decoder::UrlencodedDecoder;
pub use urlencoded_decoder::{decode_pair, parse_pairs};

use crate::protocol::{MultiMap, ParseError};
use bytes::Bytes;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// How a request body should be decoded, derived from its `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// `application/json`, `application/json+*` and `application/*+json`
    Json,
    /// `application/x-www-form-urlencoded`
    Urlencoded,
    /// `multipart/form-data` with its boundary
    Multipart { boundary: String },
    /// Anything else, including a missing or unparsable content type
    Other,
}

impl ContentKind {
    /// Classifies a `Content-Type` header value.
    ///
    /// A `multipart/form-data` type without a boundary parameter is malformed input.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ParseError> {
        let Some(mime) = content_type.and_then(|value| value.parse::<mime::Mime>().ok()) else {
            return Ok(ContentKind::Other);
        };

        if mime.type_() == mime::APPLICATION {
            if mime.subtype() == mime::JSON || mime.suffix().is_some_and(|suffix| suffix == mime::JSON) {
                return Ok(ContentKind::Json);
            }
            if mime.subtype() == mime::WWW_FORM_URLENCODED {
                return Ok(ContentKind::Urlencoded);
            }
        }

        if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            let boundary = mime
                .get_param(mime::BOUNDARY)
                .map(|name| name.as_str().trim_matches('"').to_string())
                .filter(|boundary| !boundary.is_empty())
                .ok_or_else(|| ParseError::invalid_form("multipart/form-data without boundary"))?;
            return Ok(ContentKind::Multipart { boundary });
        }

        Ok(ContentKind::Other)
    }
}

/// A file part of a multipart form, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    field_name: String,
    file_name: String,
    content_type: Option<String>,
    content: Bytes,
}

impl UploadFile {
    pub fn new(field_name: impl Into<String>, file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self { field_name: field_name.into(), file_name: file_name.into(), content_type: None, content: content.into() }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The file name declared by the client.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Serialize for UploadFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut file = serializer.serialize_struct("UploadFile", 4)?;
        file.serialize_field("field_name", &self.field_name)?;
        file.serialize_field("file_name", &self.file_name)?;
        file.serialize_field("content_type", &self.content_type)?;
        file.serialize_field("size", &self.content.len())?;
        file.end()
    }
}

/// A decoded form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    File(UploadFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadFile> {
        match self {
            FormValue::Text(_) => None,
            FormValue::File(file) => Some(file),
        }
    }
}

impl From<String> for FormValue {
    fn from(text: String) -> Self {
        FormValue::Text(text)
    }
}

impl From<&str> for FormValue {
    fn from(text: &str) -> Self {
        FormValue::Text(text.to_string())
    }
}

impl From<UploadFile> for FormValue {
    fn from(file: UploadFile) -> Self {
        FormValue::File(file)
    }
}

/// Receives the fields decoded by the form parsers, in body order.
pub trait FormSink {
    fn on_field(&mut self, name: String, value: String);

    fn on_file(&mut self, file: UploadFile);
}

impl FormSink for MultiMap<FormValue> {
    fn on_field(&mut self, name: String, value: String) {
        self.set(name, FormValue::Text(value));
    }

    fn on_file(&mut self, file: UploadFile) {
        let name = file.field_name().to_string();
        self.set(name, FormValue::File(file));
    }
}

/// Finds the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
