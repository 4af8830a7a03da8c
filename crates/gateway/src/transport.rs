//! The boundary with the hosting transport.
//!
//! The transport drives an [`Application`] with a [`Scope`], a way to pull inbound events
//! ([`EventReceiver`]) and a way to push outbound frames ([`EventSender`]). Channel backed
//! implementations are provided so hosts and tests can run an application in-process.

use crate::protocol::{GatewayError, ReceiveEvent, Scope, SendEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The transport's `receive` side.
///
/// A closed transport reports [`GatewayError::Disconnected`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventReceiver: Send {
    async fn receive(&mut self) -> Result<ReceiveEvent, GatewayError>;
}

/// The transport's `send` side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSender: Send {
    async fn send(&mut self, event: SendEvent) -> Result<(), GatewayError>;
}

/// An application hosted behind the gateway.
#[async_trait]
pub trait Application: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn call(
        &self,
        scope: Scope,
        receive: &mut dyn EventReceiver,
        send: &mut dyn EventSender,
    ) -> Result<(), Self::Error>;
}

#[async_trait]
impl EventReceiver for mpsc::Receiver<ReceiveEvent> {
    async fn receive(&mut self) -> Result<ReceiveEvent, GatewayError> {
        self.recv().await.ok_or(GatewayError::Disconnected)
    }
}

#[async_trait]
impl EventReceiver for mpsc::UnboundedReceiver<ReceiveEvent> {
    async fn receive(&mut self) -> Result<ReceiveEvent, GatewayError> {
        self.recv().await.ok_or(GatewayError::Disconnected)
    }
}

#[async_trait]
impl EventSender for mpsc::Sender<SendEvent> {
    async fn send(&mut self, event: SendEvent) -> Result<(), GatewayError> {
        mpsc::Sender::send(self, event).await.map_err(|_closed| GatewayError::Disconnected)
    }
}

#[async_trait]
impl EventSender for mpsc::UnboundedSender<SendEvent> {
    async fn send(&mut self, event: SendEvent) -> Result<(), GatewayError> {
        mpsc::UnboundedSender::send(self, event).map_err(|_closed| GatewayError::Disconnected)
    }
}
