use crate::body::BodyReader;
use crate::protocol::{GatewayError, ParseError};
use bytes::BytesMut;
use serde_json::Value;
use tracing::trace;

/// Assembles the single top-level JSON value of a request body.
///
/// Bytes are pulled through the [`BodyReader`] until the body is exhausted, then parsed in
/// one pass. Trailing data after the value, invalid UTF-8 and truncated documents are all
/// reported as [`ParseError::InvalidJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder {
    max_size: Option<usize>,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`ParseError::TooLargeBody`] once the body grows beyond `max_size`.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub async fn decode(&self, reader: &mut BodyReader<'_>) -> Result<Value, GatewayError> {
        let mut buffer = BytesMut::new();
        loop {
            let bytes = reader.read(None).await?;
            if bytes.is_empty() && reader.is_exhausted() {
                break;
            }

            buffer.extend_from_slice(&bytes);
            if let Some(max_size) = self.max_size
                && buffer.len() > max_size
            {
                return Err(ParseError::too_large_body(buffer.len(), max_size).into());
            }
        }

        trace!(size = buffer.len(), "decode json body");
        serde_json::from_slice(&buffer).map_err(|e| ParseError::invalid_json(e).into())
    }
}
