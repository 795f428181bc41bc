use super::CallContext;
use core::future::Future;
use courier_core::{Error, Result, deadline::run_until};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

/// Client half of a client-streaming call.
///
/// The call itself runs on its own task, fed by a bounded channel, so
/// [`send`](Self::send) only waits for buffer space. [`finish`](Self::finish)
/// closes the send side and waits for the single aggregate response.
///
/// Dropping the sender without finishing aborts the call.
pub struct ClientStreamSender<Req, Resp> {
    tx: Option<mpsc::Sender<Req>>,
    call: Option<JoinHandle<Result<Resp>>>,
    outcome: Option<Result<Resp>>,
    ctx: CallContext,
    sent: usize,
}

impl<Req, Resp> ClientStreamSender<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Starts the call. `call` receives the outbound request stream and
    /// returns the pending RPC, e.g. `|req| client.long_greet(req)`.
    pub fn open<F, Fut>(ctx: CallContext, buffer: usize, call: F) -> Self
    where
        F: FnOnce(Request<ReceiverStream<Req>>) -> Fut,
        Fut: Future<Output = core::result::Result<Response<Resp>, Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let pending = call(ctx.request(ReceiverStream::new(rx)));
        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.guard(pending).await.map(Response::into_inner) }
        });

        Self {
            tx: Some(tx),
            call: Some(task),
            outcome: None,
            ctx,
            sent: 0,
        }
    }

    /// Queues one message.
    ///
    /// # Errors
    ///
    /// The context's abort error, or the call's own terminal status when it
    /// ended before this message could be delivered.
    pub async fn send(&mut self, message: Req) -> Result<()> {
        if let Some(outcome) = &self.outcome {
            return Err(ended_early(outcome));
        }
        let Some(tx) = &self.tx else {
            return Err(Error::internal("Send side is already closed"));
        };

        let ctx = &self.ctx;
        let sent = run_until(ctx.deadline(), ctx.cancel_token(), tx.send(message)).await?;
        if sent.is_ok() {
            self.sent += 1;
            return Ok(());
        }

        // The request stream was dropped: the call is over.
        self.tx = None;
        let outcome = self.settle().await;
        let err = ended_early(&outcome);
        self.outcome = Some(outcome);
        Err(err)
    }

    /// Messages accepted so far.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Closes the send side and waits for the aggregate response.
    ///
    /// # Errors
    ///
    /// The call's classified failure status or the context's abort error.
    pub async fn finish(mut self) -> Result<Resp> {
        self.tx = None;
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.settle().await,
        }
    }

    async fn settle(&mut self) -> Result<Resp> {
        let Some(call) = self.call.take() else {
            return Err(Error::internal("Call outcome was already taken"));
        };
        call.await
            .unwrap_or_else(|e| Err(Error::internal(format!("Call task failed: {e}"))))
    }
}

impl<Req, Resp> Drop for ClientStreamSender<Req, Resp> {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            call.abort();
        }
    }
}

fn ended_early<Resp>(outcome: &Result<Resp>) -> Error {
    match outcome {
        Ok(_) => Error::internal("Server completed the call before the client finished sending"),
        Err(e) => e.clone(),
    }
}
