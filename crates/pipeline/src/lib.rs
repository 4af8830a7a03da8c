//! A small web application framework on top of `micro-gateway`.
//!
//! Applications register routes and hooks on an [`AppBuilder`], then hand the resulting
//! [`App`] to a hosting transport. The app answers the lifespan scope by running its
//! startup and shutdown hooks, and every request scope by running the request pipeline:
//!
//! 1. decode the request identity, headers and cookies
//! 2. decode the body as JSON, a form or raw bytes, within the body size limit
//! 3. run the before-hooks, any of which may answer the request itself
//! 4. route by path and method, then invoke the handler
//! 5. run the after-hooks, which may replace the response
//! 6. serialize the response into a start frame and a body frame
//!
//! Malformed input is answered with `400 Bad Request`, an oversized body with
//! `413 Payload Too Large`. Failures of handlers and hooks are not turned into responses,
//! they surface to the host as [`AppError`].
//!
//! # Example
//!
//! ```
//! use micro_gateway::protocol::{BodyChunk, HttpScope, LifespanScope, ReceiveEvent, Scope, SendEvent};
//! use micro_gateway::transport::Application;
//! use micro_pipeline::hook::handler_fn;
//! use micro_pipeline::{App, Request};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let app = Arc::new(
//!     App::builder()
//!         .get("/hello/{name}", handler_fn(|req: Arc<Request>| async move {
//!             format!("hello {}", req.param("name").unwrap_or("world"))
//!         }))
//!         .build(),
//! );
//!
//! // the lifespan scope stays open for the lifetime of the process
//! let (lifespan_tx, mut lifespan_rx) = mpsc::unbounded_channel::<ReceiveEvent>();
//! let (mut lifespan_out, mut lifespan_events) = mpsc::unbounded_channel::<SendEvent>();
//! let lifespan_app = Arc::clone(&app);
//! tokio::spawn(async move {
//!     let scope = Scope::Lifespan(LifespanScope::default());
//!     lifespan_app.call(scope, &mut lifespan_rx, &mut lifespan_out).await
//! });
//! lifespan_tx.send(ReceiveEvent::Startup).unwrap();
//! assert_eq!(lifespan_events.recv().await, Some(SendEvent::StartupComplete));
//!
//! let (body_tx, mut body_rx) = mpsc::unbounded_channel::<ReceiveEvent>();
//! body_tx.send(ReceiveEvent::from(BodyChunk::last(""))).unwrap();
//! let (mut send_tx, mut send_rx) = mpsc::unbounded_channel::<SendEvent>();
//! app.call(Scope::Http(HttpScope::new("GET", "/hello/micro")), &mut body_rx, &mut send_tx).await.unwrap();
//!
//! let Some(SendEvent::ResponseStart { status, .. }) = send_rx.recv().await else { unreachable!() };
//! assert_eq!(status, 200);
//! let Some(SendEvent::ResponseBody { body }) = send_rx.recv().await else { unreachable!() };
//! assert_eq!(body, "hello micro");
//! # }
//! ```

mod error;

pub mod app;
pub mod cookie;
pub mod hook;
pub mod reply;
pub mod request;
pub mod response;
pub mod router;

#[cfg(test)]
mod test_client;

pub use app::App;
pub use app::AppBuilder;
pub use app::DEFAULT_MAX_CONTENT;
pub use cookie::Cookie;
pub use cookie::SameSite;
pub use error::AppError;
pub use reply::IntoReply;
pub use reply::Reply;
pub use request::Request;
pub use response::Response;
