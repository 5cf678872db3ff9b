//! Route handler contract.

use futures_util::future::BoxFuture;
use std::future::Future;

use crate::binding::Arguments;
use crate::dispatch::DispatchError;
use crate::http::Reply;

pub type HandlerFuture = BoxFuture<'static, Result<Reply, DispatchError>>;

/// Target of a route. Any `Fn(Arguments) -> impl Future<Output = Result<Reply, _>>` qualifies.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, args: Arguments) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, DispatchError>> + Send + 'static,
{
    fn call(&self, args: Arguments) -> HandlerFuture {
        Box::pin(self(args))
    }
}
