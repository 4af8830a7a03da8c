//! Request body fixtures shared by the decoder benchmarks.

use std::fmt::Write;

pub const BOUNDARY: &str = "9051914041544843365972754266";

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    content_type: String,
    payload: Vec<u8>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { name, group, content_type: content_type.into(), payload }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload cut into transport sized chunks.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = &[u8]> {
        self.payload.chunks(chunk_size)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// A JSON array of `len` one letter strings.
pub fn json_array(len: usize) -> Vec<u8> {
    let mut payload = String::with_capacity(len * 4 + 2);
    payload.push('[');
    for i in 0..len {
        if i > 0 {
            payload.push(',');
        }
        payload.push_str("\"a\"");
    }
    payload.push(']');
    payload.into_bytes()
}

/// `fields` urlencoded pairs, every value percent-encoding a space.
pub fn urlencoded_form(fields: usize) -> Vec<u8> {
    let mut payload = String::new();
    for i in 0..fields {
        if i > 0 {
            payload.push('&');
        }
        let _ = write!(payload, "field{i}=value+{i}%21");
    }
    payload.into_bytes()
}

/// A multipart form with one text field and `files` files of `file_size` bytes each.
pub fn multipart_form(files: usize, file_size: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    payload.extend_from_slice(b"Content-Disposition: form-data; name=\"text\"\r\n\r\ntext default\r\n");

    for i in 0..files {
        payload.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        payload.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file{i}\"; filename=\"f{i}.bin\"\r\n").as_bytes(),
        );
        payload.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        // dashes and line breaks keep the delimiter search busy
        payload.extend((0..file_size).map(|n| b"-\r\nx"[n % 4]));
        payload.extend_from_slice(b"\r\n");
    }

    payload.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    payload
}

pub fn form_cases() -> Vec<TestCase> {
    let multipart = format!("multipart/form-data; boundary={BOUNDARY}");
    vec![
        TestCase::new("urlencoded_small", TestGroup::Small, "application/x-www-form-urlencoded", urlencoded_form(8)),
        TestCase::new("urlencoded_large", TestGroup::Large, "application/x-www-form-urlencoded", urlencoded_form(10_000)),
        TestCase::new("multipart_small", TestGroup::Small, multipart.clone(), multipart_form(1, 1024)),
        TestCase::new("multipart_normal", TestGroup::Normal, multipart.clone(), multipart_form(4, 64 * 1024)),
        TestCase::new("multipart_large", TestGroup::Large, multipart, multipart_form(2, 1024 * 1024)),
    ]
}

pub fn json_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("json_small", TestGroup::Small, "application/json", json_array(16)),
        TestCase::new("json_large", TestGroup::Large, "application/json", json_array(100_000)),
    ]
}
