//! Core gateway protocol abstractions.
//!
//! This module holds the vocabulary shared by the hosting transport and the application:
//!
//! - **Events** (`event`): what flows across the boundary
//!   - [`Scope`]: lifespan vs. per-request invocation
//!   - [`ReceiveEvent`] / [`SendEvent`]: inbound and outbound frames
//!   - [`BodyChunk`]: a piece of a request body
//!
//! - **State** (`state`): process-wide data initialized at startup
//!   - [`SharedState`]: host owned handle, mutated by lifespan hooks
//!   - [`State`]: the per-request snapshot
//!
//! - **Ordered multimaps** ([`multimap`]): headers, query args and form fields
//!
//! - **Error Handling** (`error`):
//!   - [`GatewayError`]: transport failures
//!   - [`ParseError`]: malformed input and resource limits

mod event;
pub use event::BodyChunk;
pub use event::HttpScope;
pub use event::LifespanScope;
pub use event::RawHeader;
pub use event::ReceiveEvent;
pub use event::Scope;
pub use event::SendEvent;

mod state;
pub use state::SharedState;
pub use state::State;

pub mod multimap;
pub use multimap::HeaderMap;
pub use multimap::MultiMap;
pub use multimap::OrderedMultiMap;

mod error;
pub use error::GatewayError;
pub use error::ParseError;
