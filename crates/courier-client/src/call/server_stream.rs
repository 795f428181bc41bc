use super::CallContext;
use core::{future::Future, marker::PhantomData};
use courier_core::Result;
use futures::{Stream, StreamExt};
use tonic::{Response, Status, Streaming};

/// Client half of a server-streaming call.
///
/// [`next`](Self::next) yields messages in server emission order, then
/// `Ok(None)` exactly once the server ends the stream with `OK`. A failure
/// status is returned as `Err` and also ends the stream, so a caller always
/// observes exactly one terminal outcome.
///
/// Dropping the receiver early resets the stream; the server sees the call
/// cancelled and stops producing.
pub struct ServerStreamReceiver<T, S = Streaming<T>> {
    inbound: S,
    ctx: CallContext,
    finished: bool,
    _message: PhantomData<fn() -> T>,
}

impl<T, S> ServerStreamReceiver<T, S>
where
    S: Stream<Item = core::result::Result<T, Status>> + Unpin,
{
    /// Opens the stream by awaiting the call's response headers.
    ///
    /// # Errors
    ///
    /// The classified status if the server refuses the call, or the
    /// context's abort error.
    pub async fn open<F>(ctx: CallContext, call: F) -> Result<Self>
    where
        F: Future<Output = core::result::Result<Response<S>, Status>>,
    {
        let inbound = ctx.guard(call).await?.into_inner();
        Ok(Self::new(ctx, inbound))
    }

    pub const fn new(ctx: CallContext, inbound: S) -> Self {
        Self {
            inbound,
            ctx,
            finished: false,
            _message: PhantomData,
        }
    }

    /// Next message, or `Ok(None)` once the stream has ended cleanly.
    ///
    /// # Errors
    ///
    /// The server's failure status or the context's abort error. Calls after
    /// a terminal outcome return `Ok(None)`.
    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }
        let Self {
            inbound,
            ctx,
            finished,
            ..
        } = self;
        let next = ctx
            .guard(async { inbound.next().await.transpose() })
            .await;
        match next {
            Ok(Some(message)) => Ok(Some(message)),
            terminal => {
                *finished = true;
                terminal
            }
        }
    }

    /// Drains every remaining message.
    ///
    /// # Errors
    ///
    /// The terminal failure, if any. Messages received before it are
    /// discarded.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub const fn context(&self) -> &CallContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use courier_core::Error;
    use futures::stream;

    type Items<T> = stream::Iter<std::vec::IntoIter<core::result::Result<T, Status>>>;

    fn receiver<T>(
        ctx: CallContext,
        items: Vec<core::result::Result<T, Status>>,
    ) -> ServerStreamReceiver<T, Items<T>> {
        ServerStreamReceiver::new(ctx, stream::iter(items))
    }

    #[tokio::test]
    async fn end_of_stream_is_distinct_from_failure() {
        let mut rx = receiver(CallContext::new(), vec![Ok(2), Ok(3)]);
        assert_eq!(rx.next().await, Ok(Some(2)));
        assert_eq!(rx.next().await, Ok(Some(3)));
        assert_eq!(rx.next().await, Ok(None));
        assert!(rx.is_finished());
        assert_eq!(rx.next().await, Ok(None));
    }

    #[tokio::test]
    async fn failure_is_terminal() {
        let mut rx = receiver(
            CallContext::new(),
            vec![Ok(1), Err(Status::internal("cursor lost")), Ok(9)],
        );
        assert_eq!(rx.next().await, Ok(Some(1)));
        assert_eq!(rx.next().await, Err(Error::internal("cursor lost")));
        assert_eq!(rx.next().await, Ok(None));
    }

    #[tokio::test]
    async fn collect_returns_everything_in_order() {
        let rx = receiver(CallContext::new(), vec![Ok(2), Ok(2), Ok(5)]);
        assert_eq!(rx.collect().await, Ok(vec![2, 2, 5]));
    }

    #[tokio::test(start_paused = true)]
    async fn a_stalled_stream_hits_the_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let mut rx = ServerStreamReceiver::new(
            ctx,
            stream::pending::<core::result::Result<i64, Status>>(),
        );
        assert_eq!(rx.next().await, Err(Error::DeadlineExceeded));
        assert!(rx.is_finished());
    }
}
