//! Pull based access to a request body.
//!
//! [`BodyReader`] wraps the transport's receive side for one request. It buffers body
//! chunks and hands out bytes through a read cursor, suspending only while its buffer is
//! empty and more body events are still expected.

use crate::protocol::{GatewayError, ParseError};
use crate::transport::EventReceiver;
use bytes::{Bytes, BytesMut};
use std::fmt;
use tracing::trace;

pub struct BodyReader<'conn> {
    receive: &'conn mut dyn EventReceiver,
    buffer: BytesMut,
    finished: bool,
    received: usize,
}

impl<'conn> BodyReader<'conn> {
    pub fn new(receive: &'conn mut dyn EventReceiver) -> Self {
        Self { receive, buffer: BytesMut::new(), finished: false, received: 0 }
    }

    /// Returns true once the last body event has been received.
    ///
    /// Bytes may still be buffered; see [`BodyReader::is_exhausted`].
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true once the last body event was received and every buffered byte handed out.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }

    /// Total number of body bytes received from the transport so far.
    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Reads up to `limit` bytes, or everything buffered if `limit` is `None`.
    ///
    /// While nothing is buffered and the stream is not finished, this suspends on the
    /// transport until a chunk arrives. `Some(0)` returns immediately with no bytes, and an
    /// empty result otherwise means the body is exhausted.
    pub async fn read(&mut self, limit: Option<usize>) -> Result<Bytes, GatewayError> {
        if limit == Some(0) {
            return Ok(Bytes::new());
        }

        while self.buffer.is_empty() && !self.finished {
            self.fill().await?;
        }

        let len = match limit {
            Some(limit) => limit.min(self.buffer.len()),
            None => self.buffer.len(),
        };
        Ok(self.buffer.split_to(len).freeze())
    }

    /// Drains the whole body into one buffer.
    ///
    /// Fails with [`ParseError::TooLargeBody`] as soon as more than `max_size` bytes have
    /// been received, without waiting for the remaining events.
    pub async fn read_to_end(&mut self, max_size: Option<usize>) -> Result<Bytes, GatewayError> {
        let mut body = BytesMut::new();
        loop {
            let bytes = self.read(None).await?;
            if bytes.is_empty() && self.is_exhausted() {
                return Ok(body.freeze());
            }

            body.extend_from_slice(&bytes);
            if let Some(max_size) = max_size
                && body.len() > max_size
            {
                return Err(ParseError::too_large_body(body.len(), max_size).into());
            }
        }
    }

    async fn fill(&mut self) -> Result<(), GatewayError> {
        let chunk = self.receive.receive().await?.into_body().ok_or(GatewayError::UnexpectedEvent("body"))?;

        trace!(size = chunk.body.len(), more_body = chunk.more_body, "receive body chunk");
        self.received += chunk.body.len();
        self.buffer.extend_from_slice(&chunk.body);
        if chunk.is_last() {
            self.finished = true;
        }
        Ok(())
    }
}

impl fmt::Debug for BodyReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyReader")
            .field("buffered", &self.buffer.len())
            .field("received", &self.received)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BodyChunk, ReceiveEvent};
    use crate::transport::MockEventReceiver;
    use std::collections::VecDeque;

    fn scripted(chunks: Vec<BodyChunk>) -> MockEventReceiver {
        let times = chunks.len();
        let mut queue = chunks.into_iter().map(ReceiveEvent::Body).collect::<VecDeque<_>>();
        let mut receiver = MockEventReceiver::new();
        receiver.expect_receive().times(times).returning(move || queue.pop_front().ok_or(GatewayError::Disconnected));
        receiver
    }

    fn split_at(payload: &[u8], cuts: &[usize]) -> Vec<BodyChunk> {
        let mut chunks = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            chunks.push(BodyChunk::new(Bytes::copy_from_slice(&payload[start..cut]), true));
            start = cut;
        }
        chunks.push(BodyChunk::last(Bytes::copy_from_slice(&payload[start..])));
        chunks
    }

    #[tokio::test]
    async fn test_chunking_invariance() {
        let payload = b"the quick brown fox jumps over the lazy dog".to_vec();
        let cut_sets: Vec<Vec<usize>> =
            vec![vec![], vec![1], vec![10, 11, 12], vec![0, 0, 5, 43], (1..payload.len()).collect()];

        for cuts in cut_sets {
            for read_size in [None, Some(1), Some(3), Some(64)] {
                let mut receiver = scripted(split_at(&payload, &cuts));
                let mut reader = BodyReader::new(&mut receiver);

                let mut collected = Vec::new();
                loop {
                    let bytes = reader.read(read_size).await.unwrap();
                    if bytes.is_empty() {
                        break;
                    }
                    collected.extend_from_slice(&bytes);
                }

                assert_eq!(collected, payload, "cuts: {cuts:?}, read size: {read_size:?}");
                assert!(reader.is_exhausted());
                assert_eq!(reader.received(), payload.len());
            }
        }
    }

    #[tokio::test]
    async fn test_read_zero_does_not_touch_transport() {
        let mut receiver = MockEventReceiver::new();
        receiver.expect_receive().never();

        let mut reader = BodyReader::new(&mut receiver);
        assert!(reader.read(Some(0)).await.unwrap().is_empty());
        assert!(!reader.is_finished());
    }

    #[tokio::test]
    async fn test_read_keeps_remainder() {
        let mut receiver = scripted(vec![BodyChunk::new("hello", true), BodyChunk::last(" world")]);
        let mut reader = BodyReader::new(&mut receiver);

        assert_eq!(reader.read(Some(2)).await.unwrap(), Bytes::from_static(b"he"));
        assert_eq!(reader.read(None).await.unwrap(), Bytes::from_static(b"llo"));
        assert_eq!(reader.read(Some(100)).await.unwrap(), Bytes::from_static(b" world"));
        assert!(reader.read(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_to_end() {
        let mut receiver = scripted(vec![BodyChunk::new("a=", true), BodyChunk::new("", true), BodyChunk::last("1")]);
        let mut reader = BodyReader::new(&mut receiver);

        assert_eq!(reader.read_to_end(Some(3)).await.unwrap(), Bytes::from_static(b"a=1"));
    }

    #[tokio::test]
    async fn test_read_to_end_too_large_stops_early() {
        let mut receiver = scripted(vec![BodyChunk::new("0123456789", true)]);
        let mut reader = BodyReader::new(&mut receiver);

        let result = reader.read_to_end(Some(4)).await;
        assert!(matches!(
            result,
            Err(GatewayError::Parse { source: ParseError::TooLargeBody { current_size: 10, max_size: 4 } })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_reported() {
        let mut receiver = scripted(vec![BodyChunk::new("partial", true)]);
        let mut reader = BodyReader::new(&mut receiver);

        assert_eq!(reader.read(None).await.unwrap(), Bytes::from_static(b"partial"));
        assert!(!reader.is_finished());

        let mut receiver = MockEventReceiver::new();
        receiver.expect_receive().times(1).returning(|| Err(GatewayError::Disconnected));
        let mut reader = BodyReader::new(&mut receiver);
        assert!(matches!(reader.read(None).await, Err(GatewayError::Disconnected)));
    }
}
