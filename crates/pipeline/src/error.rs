use crate::hook::BoxError;
use crate::router::RouterError;
use micro_gateway::protocol::GatewayError;
use thiserror::Error;

/// Failures surfaced to the hosting transport.
///
/// None of these can be answered with an HTTP response by the application itself: the
/// host decides what to do, typically a `500` for request scopes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("request received before a successful startup")]
    NotStarted,

    #[error("handler failed: {0}")]
    Handler(BoxError),

    #[error("status code {0} is out of range")]
    InvalidStatus(u16),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),
}
