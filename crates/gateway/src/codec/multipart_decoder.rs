//! Push based decoder for `multipart/form-data` bodies, as defined in
//! [RFC 7578](https://tools.ietf.org/html/rfc7578).
//!
//! The decoder is a small state machine over an internal buffer. Chunk boundaries may fall
//! anywhere, including inside a delimiter; the buffer only ever retains the bytes that could
//! still turn out to be the start of a delimiter (or an incomplete part header block).
//!
//! Parts carrying a `filename` in their `Content-Disposition` become [`UploadFile`]s, all
//! other parts are text fields and must be valid UTF-8.

use crate::codec::{find, FormSink, UploadFile};
use crate::protocol::ParseError;
use bytes::{Buf, BytesMut};
use tracing::trace;

/// Limit of a single part's header block.
pub const MAX_PART_HEADER_SIZE: usize = 8 * 1024;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug)]
pub struct MultipartDecoder {
    /// `--boundary`, the first delimiter may appear without a leading CRLF
    dash_boundary: Vec<u8>,
    /// `\r\n--boundary`, every later delimiter
    delimiter: Vec<u8>,
    buffer: BytesMut,
    phase: Phase,
    part: Option<PartBuilder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Skipping the preamble until the first delimiter
    Preamble,
    /// Right after a delimiter: either `--` (close) or CRLF (next part) follows
    DelimiterTail,
    /// Reading a part's header block
    Headers,
    /// Reading a part's content
    Content,
    /// After the close delimiter, the epilogue is ignored
    Finished,
}

#[derive(Debug)]
struct PartBuilder {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: BytesMut,
}

impl MultipartDecoder {
    pub fn new(boundary: &str) -> Self {
        let mut dash_boundary = Vec::with_capacity(boundary.len() + 2);
        dash_boundary.extend_from_slice(b"--");
        dash_boundary.extend_from_slice(boundary.as_bytes());

        let mut delimiter = Vec::with_capacity(dash_boundary.len() + 2);
        delimiter.extend_from_slice(CRLF);
        delimiter.extend_from_slice(&dash_boundary);

        Self { dash_boundary, delimiter, buffer: BytesMut::new(), phase: Phase::Preamble, part: None }
    }

    /// Returns true once the close delimiter has been seen.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Feeds one chunk, emitting every part it completes.
    pub fn write<S: FormSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), ParseError> {
        if self.phase == Phase::Finished {
            return Ok(());
        }

        self.buffer.extend_from_slice(chunk);
        while self.step(sink)? {}
        Ok(())
    }

    /// Checks that the body ended with the close delimiter.
    pub fn finalize<S: FormSink + ?Sized>(&mut self, _sink: &mut S) -> Result<(), ParseError> {
        if self.is_finished() {
            return Ok(());
        }
        Err(ParseError::invalid_form("multipart body ended before the close delimiter"))
    }

    /// Runs one transition, returns false when more input is needed.
    fn step<S: FormSink + ?Sized>(&mut self, sink: &mut S) -> Result<bool, ParseError> {
        match self.phase {
            Phase::Preamble => Ok(self.skip_preamble()),
            Phase::DelimiterTail => self.read_delimiter_tail(),
            Phase::Headers => self.read_headers(),
            Phase::Content => self.read_content(sink),
            Phase::Finished => {
                self.buffer.clear();
                Ok(false)
            }
        }
    }

    fn skip_preamble(&mut self) -> bool {
        if let Some(pos) = find(&self.buffer, &self.dash_boundary) {
            self.buffer.advance(pos + self.dash_boundary.len());
            self.phase = Phase::DelimiterTail;
            return true;
        }

        let keep = self.dash_boundary.len() - 1;
        if self.buffer.len() > keep {
            let skip = self.buffer.len() - keep;
            self.buffer.advance(skip);
        }
        false
    }

    fn read_delimiter_tail(&mut self) -> Result<bool, ParseError> {
        // transport padding is allowed between the boundary and its line break
        while matches!(self.buffer.first(), Some(b' ' | b'\t')) {
            self.buffer.advance(1);
        }

        if self.buffer.len() < 2 {
            return Ok(false);
        }

        if self.buffer.starts_with(b"--") {
            self.buffer.clear();
            self.phase = Phase::Finished;
            return Ok(false);
        }

        if self.buffer.starts_with(CRLF) {
            self.buffer.advance(CRLF.len());
            self.phase = Phase::Headers;
            return Ok(true);
        }

        Err(ParseError::invalid_form("malformed multipart delimiter line"))
    }

    fn read_headers(&mut self) -> Result<bool, ParseError> {
        let block_len = if self.buffer.starts_with(CRLF) {
            Some(0)
        } else {
            find(&self.buffer, HEADER_END)
        };

        let Some(block_len) = block_len else {
            if self.buffer.len() > MAX_PART_HEADER_SIZE {
                return Err(ParseError::invalid_form("multipart part header block too large"));
            }
            return Ok(false);
        };

        if block_len > MAX_PART_HEADER_SIZE {
            return Err(ParseError::invalid_form("multipart part header block too large"));
        }

        let part = PartBuilder::parse(&self.buffer[..block_len])?;
        let terminator = if block_len == 0 { CRLF.len() } else { HEADER_END.len() };
        self.buffer.advance(block_len + terminator);

        trace!(name = %part.name, file = part.file_name.is_some(), "multipart part start");
        self.part = Some(part);
        self.phase = Phase::Content;
        Ok(true)
    }

    fn read_content<S: FormSink + ?Sized>(&mut self, sink: &mut S) -> Result<bool, ParseError> {
        let Some(part) = self.part.as_mut() else {
            return Err(ParseError::invalid_form("multipart content outside of a part"));
        };

        match find(&self.buffer, &self.delimiter) {
            Some(pos) => {
                part.data.extend_from_slice(&self.buffer[..pos]);
                self.buffer.advance(pos + self.delimiter.len());
                if let Some(part) = self.part.take() {
                    part.emit(sink)?;
                }
                self.phase = Phase::DelimiterTail;
                Ok(true)
            }
            None => {
                // everything but a possible delimiter prefix is content
                let safe = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
                let data = self.buffer.split_to(safe);
                part.data.extend_from_slice(&data);
                Ok(false)
            }
        }
    }
}

impl PartBuilder {
    fn parse(block: &[u8]) -> Result<Self, ParseError> {
        let block = std::str::from_utf8(block).map_err(|e| ParseError::invalid_form(format!("part header: {e}")))?;

        let mut name = None;
        let mut file_name = None;
        let mut content_type = None;

        for line in block.split("\r\n").filter(|line| !line.is_empty()) {
            let (header_name, value) =
                line.split_once(':').ok_or_else(|| ParseError::invalid_form(format!("malformed part header: {line}")))?;

            if header_name.trim().eq_ignore_ascii_case("content-disposition") {
                let (_disposition, params) = parse_options_header(value);
                for (key, value) in params {
                    match key.as_str() {
                        "name" => name = Some(value),
                        "filename" => file_name = Some(value),
                        _ => {}
                    }
                }
            } else if header_name.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }

        let name = name.ok_or_else(|| ParseError::invalid_form("part without a content-disposition name"))?;
        Ok(Self { name, file_name, content_type, data: BytesMut::new() })
    }

    fn emit<S: FormSink + ?Sized>(self, sink: &mut S) -> Result<(), ParseError> {
        match self.file_name {
            Some(file_name) => {
                let file = UploadFile::new(self.name, file_name, self.data.freeze()).with_content_type(self.content_type);
                sink.on_file(file);
            }
            None => {
                let value = String::from_utf8(self.data.to_vec())
                    .map_err(|_| ParseError::invalid_form(format!("field {} is not utf-8", self.name)))?;
                sink.on_field(self.name, value);
            }
        }
        Ok(())
    }
}

/// Splits a header value like `form-data; name="a"; filename="b.txt"` into its main value and
/// its parameters. Parameter names are lowercased, quoted values are unescaped.
fn parse_options_header(value: &str) -> (String, Vec<(String, String)>) {
    let (main, mut rest) = match value.find(';') {
        Some(pos) => (&value[..pos], &value[pos + 1..]),
        None => (value, ""),
    };

    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
        if rest.is_empty() {
            break;
        }

        let key_end = rest.find(['=', ';']).unwrap_or(rest.len());
        let key = rest[..key_end].trim().to_ascii_lowercase();
        rest = &rest[key_end..];

        let Some(after_eq) = rest.strip_prefix('=') else {
            params.push((key, String::new()));
            continue;
        };

        let (param_value, remaining) = match after_eq.trim_start().strip_prefix('"') {
            Some(quoted) => read_quoted(quoted),
            None => {
                let end = after_eq.find(';').unwrap_or(after_eq.len());
                (after_eq[..end].trim().to_string(), &after_eq[end..])
            }
        };
        params.push((key, param_value));
        rest = remaining;
    }

    (main.trim().to_ascii_lowercase(), params)
}

/// Reads a quoted string whose opening quote was already consumed.
fn read_quoted(input: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return (value, &input[idx + 1..]),
            c => value.push(c),
        }
    }
    (value, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FormValue;
    use crate::protocol::MultiMap;

    const BOUNDARY: &str = "9051914041544843365972754266";

    fn payload() -> Vec<u8> {
        let mut payload = Vec::new();
        for line in [
            "--9051914041544843365972754266",
            "Content-Disposition: form-data; name=\"text\"",
            "",
            "text default",
            "--9051914041544843365972754266",
            "Content-Disposition: form-data; name=\"file1\"; filename=\"a.txt\"",
            "Content-Type: text/plain",
            "",
            "Content of a.txt.\n",
            "--9051914041544843365972754266",
            "Content-Disposition: form-data; name=\"file2\"; filename=\"a.html\"",
            "Content-Type: text/html",
            "",
            "<!DOCTYPE html><title>Content of a.html.</title>\n",
        ] {
            payload.extend_from_slice(line.as_bytes());
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(b"--9051914041544843365972754266--");
        payload
    }

    fn decode(chunks: &[&[u8]]) -> Result<MultiMap<FormValue>, ParseError> {
        let mut form = MultiMap::new();
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        for chunk in chunks {
            decoder.write(chunk, &mut form)?;
        }
        decoder.finalize(&mut form)?;
        Ok(form)
    }

    fn assert_form(form: &MultiMap<FormValue>) {
        assert_eq!(form.keys().collect::<Vec<_>>(), vec!["text", "file1", "file2"]);
        assert_eq!(form.get("text").and_then(FormValue::as_text), Some("text default"));

        let file1 = form.get("file1").and_then(FormValue::as_file).unwrap();
        assert_eq!(file1.field_name(), "file1");
        assert_eq!(file1.file_name(), "a.txt");
        assert_eq!(file1.content_type(), Some("text/plain"));
        assert_eq!(file1.content().as_ref(), b"Content of a.txt.\n");

        let file2 = form.get("file2").and_then(FormValue::as_file).unwrap();
        assert_eq!(file2.file_name(), "a.html");
        assert_eq!(file2.content().as_ref(), b"<!DOCTYPE html><title>Content of a.html.</title>\n");
    }

    #[test]
    fn test_single_chunk() {
        let payload = payload();
        assert_form(&decode(&[&payload]).unwrap());
    }

    #[test]
    fn test_split_at_every_position() {
        let payload = payload();
        for cut in 0..=payload.len() {
            let form = decode(&[&payload[..cut], &payload[cut..]]).unwrap();
            assert_form(&form);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let payload = payload();
        let chunks = payload.chunks(1).collect::<Vec<_>>();
        assert_form(&decode(&chunks).unwrap());
    }

    #[test]
    fn test_preamble_and_epilogue_are_ignored() {
        let mut body = b"this is the preamble\r\n".to_vec();
        body.extend_from_slice(&payload());
        body.extend_from_slice(b"\r\nthis is the epilogue");
        assert_form(&decode(&[&body]).unwrap());
    }

    #[test]
    fn test_missing_close_delimiter() {
        let payload = payload();
        let truncated = &payload[..payload.len() - 40];
        assert!(matches!(decode(&[truncated]), Err(ParseError::InvalidForm { .. })));
        assert!(matches!(decode(&[b"".as_slice()]), Err(ParseError::InvalidForm { .. })));
    }

    #[test]
    fn test_part_without_name() {
        let body = b"--9051914041544843365972754266\r\nContent-Type: text/plain\r\n\r\nx\r\n--9051914041544843365972754266--";
        assert!(matches!(decode(&[body.as_slice()]), Err(ParseError::InvalidForm { .. })));
    }

    #[test]
    fn test_field_not_utf8() {
        let mut body = b"--9051914041544843365972754266\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n".to_vec();
        body.extend_from_slice(&[0xff, 0xfe]);
        body.extend_from_slice(b"\r\n--9051914041544843365972754266--");
        assert!(matches!(decode(&[&body]), Err(ParseError::InvalidForm { .. })));
    }

    #[test]
    fn test_header_block_too_large() {
        let mut body = b"--9051914041544843365972754266\r\nX-Long: ".to_vec();
        body.extend(std::iter::repeat_n(b'a', MAX_PART_HEADER_SIZE + 1));
        assert!(matches!(decode(&[&body]), Err(ParseError::InvalidForm { .. })));
    }

    #[test]
    fn test_parse_options_header() {
        let (main, params) = parse_options_header(r#"Form-Data; name="a;b"; filename="c\"d.txt"; flag"#);
        assert_eq!(main, "form-data");
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "a;b".to_string()),
                ("filename".to_string(), "c\"d.txt".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );

        let (main, params) = parse_options_header("form-data; name=plain");
        assert_eq!(main, "form-data");
        assert_eq!(params, vec![("name".to_string(), "plain".to_string())]);
    }
}
