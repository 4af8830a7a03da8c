//! An in-process host for driving an [`App`] in tests.

use crate::app::App;
use crate::error::AppError;
use bytes::Bytes;
use micro_gateway::protocol::{BodyChunk, HttpScope, LifespanScope, ReceiveEvent, Scope, SendEvent, SharedState};
use micro_gateway::transport::Application;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct TestClient {
    app: Arc<App>,
    state: SharedState,
    lifespan_tx: mpsc::UnboundedSender<ReceiveEvent>,
    lifespan_rx: mpsc::UnboundedReceiver<SendEvent>,
}

impl TestClient {
    /// Spawns the lifespan conversation of `app`; no event is sent yet.
    pub(crate) fn new(app: Arc<App>) -> Self {
        let state = SharedState::default();
        let (lifespan_tx, mut receive) = mpsc::unbounded_channel::<ReceiveEvent>();
        let (mut send, lifespan_rx) = mpsc::unbounded_channel::<SendEvent>();

        let scope = Scope::Lifespan(LifespanScope { state: state.clone() });
        let lifespan_app = Arc::clone(&app);
        tokio::spawn(async move { lifespan_app.call(scope, &mut receive, &mut send).await });

        Self { app, state, lifespan_tx, lifespan_rx }
    }

    pub(crate) async fn started(app: App) -> Self {
        Self::started_shared(Arc::new(app)).await
    }

    pub(crate) async fn started_shared(app: Arc<App>) -> Self {
        let mut client = Self::new(app);
        assert_eq!(client.startup().await, SendEvent::StartupComplete);
        client
    }

    pub(crate) async fn startup(&mut self) -> SendEvent {
        self.lifespan(ReceiveEvent::Startup).await
    }

    pub(crate) async fn shutdown(&mut self) -> SendEvent {
        self.lifespan(ReceiveEvent::Shutdown).await
    }

    async fn lifespan(&mut self, event: ReceiveEvent) -> SendEvent {
        self.lifespan_tx.send(event).unwrap();
        self.lifespan_rx.recv().await.unwrap()
    }

    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    /// Runs one request scope with `body` queued up front, the transport closes after it.
    ///
    /// An empty `body` sends no body event at all.
    pub(crate) async fn request_raw(
        &self,
        scope: HttpScope,
        body: Vec<BodyChunk>,
    ) -> (Result<(), AppError>, Vec<SendEvent>) {
        let scope = scope.with_state(self.state.snapshot().await);
        let (body_tx, mut receive) = mpsc::unbounded_channel::<ReceiveEvent>();
        for chunk in body {
            body_tx.send(ReceiveEvent::from(chunk)).unwrap();
        }
        drop(body_tx);

        let (mut send, mut frames_rx) = mpsc::unbounded_channel::<SendEvent>();
        let result = self.app.call(Scope::Http(scope), &mut receive, &mut send).await;
        drop(send);

        let mut frames = vec![];
        while let Some(frame) = frames_rx.recv().await {
            frames.push(frame);
        }
        (result, frames)
    }

    pub(crate) async fn request(&self, scope: HttpScope, body: Vec<BodyChunk>) -> Result<TestResponse, AppError> {
        let (result, frames) = self.request_raw(scope, body).await;
        result?;
        Ok(TestResponse::from_frames(frames))
    }
}

#[derive(Debug)]
pub(crate) struct TestResponse {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

impl TestResponse {
    fn from_frames(frames: Vec<SendEvent>) -> Self {
        let mut frames = frames.into_iter();
        let (Some(SendEvent::ResponseStart { status, headers }), Some(SendEvent::ResponseBody { body }), None) =
            (frames.next(), frames.next(), frames.next())
        else {
            panic!("expected a start frame followed by a body frame");
        };

        let headers = headers
            .into_iter()
            .map(|(name, value)| {
                (String::from_utf8_lossy(&name).into_owned(), String::from_utf8_lossy(&value).into_owned())
            })
            .collect();
        Self { status, headers, body }
    }

    /// The last value of header `name`; names on the wire are lowercase.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).pop()
    }

    pub(crate) fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers.iter().filter(|(key, _)| key == name).map(|(_, value)| value.as_str()).collect()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Splits `payload` into two body events at `cut`.
pub(crate) fn split_at(payload: &[u8], cut: usize) -> Vec<BodyChunk> {
    let (head, tail) = payload.split_at(cut);
    vec![BodyChunk::new(Bytes::copy_from_slice(head), true), BodyChunk::last(Bytes::copy_from_slice(tail))]
}

/// A form with one text field and two files, delimited by `9051914041544843365972754266`.
pub(crate) fn multipart_payload() -> Vec<u8> {
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
