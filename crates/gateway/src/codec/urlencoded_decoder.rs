//! Push based decoder for `application/x-www-form-urlencoded` bodies.
//!
//! Chunks may split a pair anywhere, even inside a percent escape: complete `&` separated
//! pairs are emitted as soon as they are available and the incomplete tail waits for the
//! next chunk or [`UrlencodedDecoder::finalize`].

use crate::codec::FormSink;
use crate::protocol::ParseError;
use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct UrlencodedDecoder {
    pending: BytesMut,
}

impl UrlencodedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk, emitting every pair it completes.
    pub fn write<S: FormSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), ParseError> {
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'&') {
            let segment = self.pending.split_to(pos);
            self.pending.advance(1);
            decode_segment(&segment, sink)?;
        }
        Ok(())
    }

    /// Emits the trailing pair once the body is complete.
    pub fn finalize<S: FormSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), ParseError> {
        let segment = self.pending.split();
        decode_segment(&segment, sink)
    }
}

/// Decodes a whole `&` separated string, such as a query string, into its pairs.
///
/// Empty segments are skipped. `+` stands for a space and every percent escape must
/// decode to UTF-8, otherwise the input is malformed.
pub fn parse_pairs(input: &[u8]) -> Result<Vec<(String, String)>, ParseError> {
    input.split(|b| *b == b'&').filter(|segment| !segment.is_empty()).map(decode_pair).collect()
}

/// Decodes one `name=value` segment; a segment without `=` has an empty value.
pub fn decode_pair(segment: &[u8]) -> Result<(String, String), ParseError> {
    let (name, value) = match segment.iter().position(|b| *b == b'=') {
        Some(pos) => (&segment[..pos], &segment[pos + 1..]),
        None => (segment, &[][..]),
    };
    Ok((decode_component(name)?, decode_component(value)?))
}

fn decode_component(raw: &[u8]) -> Result<String, ParseError> {
    let raw = raw.iter().map(|b| if *b == b'+' { b' ' } else { *b }).collect::<Vec<_>>();
    let decoded = urlencoding::decode_binary(&raw).into_owned();
    String::from_utf8(decoded).map_err(|e| ParseError::invalid_form(format!("urlencoded value: {e}")))
}

fn decode_segment<S: FormSink + ?Sized>(segment: &[u8], sink: &mut S) -> Result<(), ParseError> {
    if segment.is_empty() {
        return Ok(());
    }

    let (name, value) = decode_pair(segment)?;
    sink.on_field(name, value);
    Ok(())
}
