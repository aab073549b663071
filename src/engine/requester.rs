use crate::error::{CloseError, ConnectError, RequestError};
use std::future::Future;

/// One connection's lifecycle as seen by the load runner.
pub trait Requester: Send + 'static {
    /// Establish the underlying connection.
    fn setup(&mut self) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Issue one request. May suspend until traffic is released.
    fn request(&mut self) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Close the underlying connection.
    fn teardown(&mut self) -> impl Future<Output = Result<(), CloseError>> + Send;

    /// Resolves once `request` would no longer suspend.
    fn ready(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

pub trait RequesterFactory: Send + Sync + 'static {
    type Requester: Requester;

    /// Called once per planned connection.
    fn get_requester(&self, index: u64) -> Self::Requester;
}
