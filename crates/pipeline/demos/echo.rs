//! Hosts an echo app in-process: one lifespan scope, then a handful of concurrent requests.

use futures::future::join_all;
use http::StatusCode;
use micro_gateway::protocol::{BodyChunk, HttpScope, LifespanScope, ReceiveEvent, Scope, SendEvent, SharedState, State};
use micro_gateway::transport::Application;
use micro_pipeline::hook::{after_fn, before_fn, blocking_fn, handler_fn, lifespan_fn};
use micro_pipeline::{App, Cookie, Request, Response};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let app = Arc::new(build_app());
    let state = SharedState::default();

    let (lifespan_tx, mut lifespan_rx) = mpsc::unbounded_channel::<ReceiveEvent>();
    let (mut lifespan_out, mut lifespan_events) = mpsc::unbounded_channel::<SendEvent>();
    let lifespan_app = Arc::clone(&app);
    let lifespan_state = state.clone();
    let lifespan = tokio::spawn(async move {
        let scope = Scope::Lifespan(LifespanScope { state: lifespan_state });
        lifespan_app.call(scope, &mut lifespan_rx, &mut lifespan_out).await
    });

    lifespan_tx.send(ReceiveEvent::Startup).expect("lifespan task is alive");
    match lifespan_events.recv().await {
        Some(SendEvent::StartupComplete) => info!("app started"),
        other => {
            error!(event = ?other, "app failed to start");
            return;
        }
    }

    let requests = vec![
        (HttpScope::new("GET", "/"), ""),
        (HttpScope::new("GET", "/hello/micro").with_header("cookie", "visits=4"), ""),
        (HttpScope::new("POST", "/echo").with_header("content-type", "application/json"), r#"{"name": "micro"}"#),
        (
            HttpScope::new("POST", "/echo").with_header("content-type", "application/x-www-form-urlencoded"),
            "name=micro&lang=rust",
        ),
        (HttpScope::new("DELETE", "/echo"), ""),
        (HttpScope::new("GET", "/admin"), ""),
    ];

    let responses = join_all(requests.into_iter().map(|(scope, body)| {
        let app = Arc::clone(&app);
        let state = state.clone();
        async move { serve(&app, scope.with_state(state.snapshot().await), body).await }
    }))
    .await;

    for (status, body) in responses.into_iter().flatten() {
        info!(status, body = %String::from_utf8_lossy(&body), "response");
    }

    lifespan_tx.send(ReceiveEvent::Shutdown).expect("lifespan task is alive");
    if let Some(event) = lifespan_events.recv().await {
        info!(event = event.type_name(), "lifespan finished");
    }
    if let Ok(Err(e)) = lifespan.await {
        error!(cause = %e, "lifespan failed");
    }
}

fn build_app() -> App {
    App::builder()
        .startup(lifespan_fn(|state: &mut State| -> Result<(), std::convert::Infallible> {
            state.insert("greeting", String::from("hello"));
            Ok(())
        }))
        .before(before_fn(|req: &mut Request| (req.path() == "/admin").then_some(StatusCode::FORBIDDEN)))
        .get("/", blocking_fn(|_req: &Request| "index"))
        .get(
            "/hello/{name}",
            blocking_fn(|req: &Request| {
                let greeting = req.state().get::<String>("greeting").map_or("hi", String::as_str);
                let visits = req.cookie("visits").and_then(|visits| visits.parse::<u32>().ok()).unwrap_or(0) + 1;
                Response::new(StatusCode::OK)
                    .with_cookie(Cookie::new("visits", visits.to_string()).path("/").http_only())
                    .with_body(format!("{greeting} {}", req.param("name").unwrap_or("stranger")))
            }),
        )
        .post(
            "/echo",
            handler_fn(|req: Arc<Request>| async move {
                if req.form().is_empty() { req.json().clone() } else { serde_json::to_value(req.form()).unwrap_or_default() }
            }),
        )
        .after(after_fn(|req: &mut Request, resp: &Response| {
            (resp.status() == StatusCode::METHOD_NOT_ALLOWED).then(|| format!("{} is not supported here", req.method()))
        }))
        .build()
}

async fn serve(app: &App, scope: HttpScope, body: &'static str) -> Option<(u16, bytes::Bytes)> {
    let (body_tx, mut body_rx) = mpsc::unbounded_channel::<ReceiveEvent>();
    body_tx.send(ReceiveEvent::from(BodyChunk::last(body))).ok()?;
    let (mut send_tx, mut send_rx) = mpsc::unbounded_channel::<SendEvent>();

    if let Err(e) = app.call(Scope::Http(scope), &mut body_rx, &mut send_tx).await {
        warn!(cause = %e, "request failed");
        return None;
    }

    let Some(SendEvent::ResponseStart { status, .. }) = send_rx.recv().await else { return None };
    let Some(SendEvent::ResponseBody { body }) = send_rx.recv().await else { return None };
    Some((status, body))
}
