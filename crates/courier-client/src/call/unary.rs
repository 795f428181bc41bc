use super::CallContext;
use core::future::Future;
use courier_core::Result;
use tonic::{Response, Status};

/// Awaits a unary call under `ctx`, yielding its single response.
///
/// The request passed to `call` should come from [`CallContext::request`] so
/// the server sees the same deadline.
///
/// # Errors
///
/// The classified failure status, or the context's abort error.
pub async fn invoke<T, F>(ctx: &CallContext, call: F) -> Result<T>
where
    F: Future<Output = core::result::Result<Response<T>, Status>>,
{
    ctx.guard(call).await.map(Response::into_inner)
}
