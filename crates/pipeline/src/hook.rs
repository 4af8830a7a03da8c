//! Handlers, hooks and the adapters turning closures into them.
//!
//! Async code implements the traits directly. Plain closures go through the `*_fn`
//! adapters, which run them on tokio's blocking pool so a slow synchronous handler never
//! stalls the other requests sharing the scheduler.

use crate::reply::{IntoReply, Reply};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use micro_gateway::protocol::State;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Serves the requests of one route and method.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Arc<Request>) -> Result<Reply, BoxError>;
}

/// Runs before routing. Returning `Some` vetoes the request and answers it right away.
#[async_trait]
pub trait BeforeHook: Send + Sync {
    async fn before(&self, req: &mut Request) -> Result<Option<Reply>, BoxError>;
}

/// Runs after the response is known. Returning `Some` replaces the response.
#[async_trait]
pub trait AfterHook: Send + Sync {
    async fn after(&self, req: &mut Request, resp: &Response) -> Result<Option<Reply>, BoxError>;
}

/// Runs on startup or shutdown against the process-wide state.
#[async_trait]
pub trait LifespanHook: Send + Sync {
    async fn call(&self, state: &mut State) -> Result<(), BoxError>;
}

/// An async closure handler.
pub struct FnHandler<F, Fut> {
    f: F,
    _phantom: PhantomData<fn() -> Fut>,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(Arc<Request>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoReply,
{
    FnHandler { f, _phantom: PhantomData }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F, Fut>
where
    F: Fn(Arc<Request>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoReply,
{
    async fn invoke(&self, req: Arc<Request>) -> Result<Reply, BoxError> {
        Ok((self.f)(req).await.into_reply())
    }
}

/// A synchronous closure handler, offloaded to the blocking pool.
pub struct BlockingHandler<F, R> {
    f: Arc<F>,
    _phantom: PhantomData<fn() -> R>,
}

pub fn blocking_fn<F, R>(f: F) -> BlockingHandler<F, R>
where
    F: Fn(&Request) -> R + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    BlockingHandler { f: Arc::new(f), _phantom: PhantomData }
}

#[async_trait]
impl<F, R> RequestHandler for BlockingHandler<F, R>
where
    F: Fn(&Request) -> R + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    async fn invoke(&self, req: Arc<Request>) -> Result<Reply, BoxError> {
        let f = Arc::clone(&self.f);
        let reply = tokio::task::spawn_blocking(move || f(req.as_ref()).into_reply()).await?;
        Ok(reply)
    }
}

/// A synchronous before-hook, offloaded to the blocking pool.
pub struct FnBeforeHook<F, R> {
    f: Arc<F>,
    _phantom: PhantomData<fn() -> R>,
}

pub fn before_fn<F, R>(f: F) -> FnBeforeHook<F, R>
where
    F: Fn(&mut Request) -> Option<R> + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    FnBeforeHook { f: Arc::new(f), _phantom: PhantomData }
}

#[async_trait]
impl<F, R> BeforeHook for FnBeforeHook<F, R>
where
    F: Fn(&mut Request) -> Option<R> + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    async fn before(&self, req: &mut Request) -> Result<Option<Reply>, BoxError> {
        let f = Arc::clone(&self.f);
        let mut owned = std::mem::take(req);
        let (owned, reply) = tokio::task::spawn_blocking(move || {
            let reply = f(&mut owned).map(IntoReply::into_reply);
            (owned, reply)
        })
        .await?;

        *req = owned;
        Ok(reply)
    }
}

/// A synchronous after-hook, offloaded to the blocking pool.
pub struct FnAfterHook<F, R> {
    f: Arc<F>,
    _phantom: PhantomData<fn() -> R>,
}

pub fn after_fn<F, R>(f: F) -> FnAfterHook<F, R>
where
    F: Fn(&mut Request, &Response) -> Option<R> + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    FnAfterHook { f: Arc::new(f), _phantom: PhantomData }
}

#[async_trait]
impl<F, R> AfterHook for FnAfterHook<F, R>
where
    F: Fn(&mut Request, &Response) -> Option<R> + Send + Sync + 'static,
    R: IntoReply + Send + 'static,
{
    async fn after(&self, req: &mut Request, resp: &Response) -> Result<Option<Reply>, BoxError> {
        let f = Arc::clone(&self.f);
        let resp = resp.clone();
        let mut owned = std::mem::take(req);
        let (owned, reply) = tokio::task::spawn_blocking(move || {
            let reply = f(&mut owned, &resp).map(IntoReply::into_reply);
            (owned, reply)
        })
        .await?;

        *req = owned;
        Ok(reply)
    }
}

/// A synchronous startup or shutdown hook, offloaded to the blocking pool.
pub struct FnLifespanHook<F, E> {
    f: Arc<F>,
    _phantom: PhantomData<fn() -> E>,
}

pub fn lifespan_fn<F, E>(f: F) -> FnLifespanHook<F, E>
where
    F: Fn(&mut State) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError> + Send + 'static,
{
    FnLifespanHook { f: Arc::new(f), _phantom: PhantomData }
}

#[async_trait]
impl<F, E> LifespanHook for FnLifespanHook<F, E>
where
    F: Fn(&mut State) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async fn call(&self, state: &mut State) -> Result<(), BoxError> {
        let f = Arc::clone(&self.f);
        let mut owned = std::mem::take(state);
        let (owned, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut owned);
            (owned, result)
        })
        .await?;

        *state = owned;
        result.map_err(Into::into)
    }
}

macro_rules! closure_debug {
    ($($name:ident),*) => {$(
        impl<F, T> fmt::Debug for $name<F, T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).field("f", &std::any::type_name::<F>()).finish()
            }
        }
    )*};
}

closure_debug!(FnHandler, BlockingHandler, FnBeforeHook, FnAfterHook, FnLifespanHook);
