use crate::codec::{ContentKind, FormSink, MultipartDecoder, UrlencodedDecoder};
use crate::protocol::{GatewayError, ParseError};
use crate::transport::EventReceiver;
use tracing::trace;

/// Drives a form parser with the raw body events of one request.
///
/// Form parsers are push based, so this reads the transport directly instead of going
/// through a [`BodyReader`](crate::body::BodyReader). The cumulative number of raw bytes is
/// checked against the limit after every chunk; once exceeded nothing more is parsed.
#[derive(Debug)]
pub struct FormDecoder {
    parser: FormParser,
    max_size: usize,
    received: usize,
}

#[derive(Debug)]
enum FormParser {
    Urlencoded(UrlencodedDecoder),
    Multipart(MultipartDecoder),
}

impl FormDecoder {
    /// Creates the decoder for a form content kind, `None` for any other kind.
    pub fn new(kind: &ContentKind, max_size: usize) -> Option<Self> {
        let parser = match kind {
            ContentKind::Urlencoded => FormParser::Urlencoded(UrlencodedDecoder::new()),
            ContentKind::Multipart { boundary } => FormParser::Multipart(MultipartDecoder::new(boundary)),
            ContentKind::Json | ContentKind::Other => return None,
        };
        Some(Self { parser, max_size, received: 0 })
    }

    /// Raw body bytes seen so far.
    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Feeds one raw chunk.
    pub fn write<S: FormSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), ParseError> {
        self.received += chunk.len();
        if self.received > self.max_size {
            return Err(ParseError::too_large_body(self.received, self.max_size));
        }

        match &mut self.parser {
            FormParser::Urlencoded(parser) => parser.write(chunk, sink),
            FormParser::Multipart(parser) => parser.write(chunk, sink),
        }
    }

    /// Completes parsing once the last chunk was written.
    pub fn finalize<S: FormSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), ParseError> {
        match &mut self.parser {
            FormParser::Urlencoded(parser) => parser.finalize(sink),
            FormParser::Multipart(parser) => parser.finalize(sink),
        }
    }

    /// Consumes body events until the transport signals the last one.
    pub async fn decode<S: FormSink + ?Sized + Send>(
        mut self,
        receive: &mut dyn EventReceiver,
        sink: &mut S,
    ) -> Result<(), GatewayError> {
        loop {
            let chunk = receive.receive().await?.into_body().ok_or(GatewayError::UnexpectedEvent("body"))?;

            trace!(size = chunk.body.len(), more_body = chunk.more_body, "decode form chunk");
            self.write(&chunk.body, sink)?;
            if chunk.is_last() {
                break;
            }
        }

        self.finalize(sink)?;
        trace!(size = self.received(), "form decoded");
        Ok(())
    }
}
