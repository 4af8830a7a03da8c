//! The application side of an asynchronous server gateway.
//!
//! A hosting transport (the server) owns sockets and HTTP framing. It invokes an
//! [`Application`](transport::Application) once per lifespan and once per request, handing
//! over a [`Scope`](protocol::Scope), a receive side for inbound events and a send side for
//! outbound frames. This crate provides everything an application needs at that boundary
//! without knowing anything about routing.
//!
//! # Features
//!
//! - Typed lifespan and request events
//! - Ordered multi-value maps for headers, query args and forms
//! - A pull based body reader that is indifferent to chunk boundaries
//! - Incremental JSON, urlencoded and multipart decoders with a body size limit
//! - Channel backed transports for in-process hosting and tests
//!
//! # Example
//!
//! ```
//! use micro_gateway::body::BodyReader;
//! use micro_gateway::codec::JsonDecoder;
//! use micro_gateway::protocol::{BodyChunk, ReceiveEvent};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, mut rx) = mpsc::unbounded_channel::<ReceiveEvent>();
//! tx.send(ReceiveEvent::from(BodyChunk::new("{\"name\":", true))).unwrap();
//! tx.send(ReceiveEvent::from(BodyChunk::last("\"micro\"}"))).unwrap();
//!
//! let mut reader = BodyReader::new(&mut rx);
//! let value = JsonDecoder::new().decode(&mut reader).await.unwrap();
//! assert_eq!(value["name"], "micro");
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: events, state, multimaps and error types
//! - [`transport`]: the receive/send/application traits and their channel implementations
//! - [`body`]: [`BodyReader`](body::BodyReader), the single suspension point of body consumption
//! - [`codec`]: content decoders selected by [`ContentKind`](codec::ContentKind)

pub mod body;
pub mod codec;
pub mod protocol;
pub mod transport;
