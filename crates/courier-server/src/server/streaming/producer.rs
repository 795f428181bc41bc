//! Server-stream producers.
//!
//! [`spawn_producer`] hands the producing closure an [`Emitter`] and returns
//! the receiving half as the gRPC response stream. The producer runs on its
//! own task so the handler can return immediately, and the bounded channel
//! between them applies the client's flow control to the producer.
//!
//! A producer that fails makes a best-effort attempt to deliver its error as
//! the final stream item. If the client has already gone away, or has stopped
//! reading, the error is only logged and the call is released regardless.

use crate::server::{
    lifecycle::CallGuard,
    telemetry::{increment_call_errors, increment_messages_streamed},
};
use core::{future::Future, pin::Pin, time::Duration};
use courier_core::{Deadline, Error, Result, deadline::run_until};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::Instrument;

/// How long a failed producer waits for a stalled client to make room for
/// its terminal status.
pub const FINAL_STATUS_GRACE: Duration = Duration::from_millis(100);

/// Boxed response stream type used by every streaming RPC.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = core::result::Result<T, Status>> + Send>>;

/// Write half of a server stream.
pub struct Emitter<T> {
    tx: mpsc::Sender<core::result::Result<T, Status>>,
    deadline: Option<Deadline>,
    cancel: CancellationToken,
    method: &'static str,
}

impl<T> Emitter<T> {
    /// Sends one message, waiting for buffer space if the client is slow.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the client dropped the stream or the server
    ///   is shutting down.
    /// - [`Error::DeadlineExceeded`] if the deadline passes first.
    pub async fn emit(&self, message: T) -> Result<()> {
        self.check()?;
        run_until(self.deadline, &self.cancel, self.tx.send(Ok(message)))
            .await?
            .map_err(|_| Error::cancelled("Client closed the response stream"))?;
        increment_messages_streamed(self.method);
        Ok(())
    }

    /// Waits `interval` between two messages. Wakes early, with an error, if
    /// the call is aborted meanwhile.
    ///
    /// # Errors
    ///
    /// Same as [`Emitter::emit`].
    pub async fn pause(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return self.check();
        }
        tokio::select! {
            biased;
            () = self.tx.closed() => Err(Error::cancelled("Client closed the response stream")),
            res = run_until(self.deadline, &self.cancel, tokio::time::sleep(interval)) => res,
        }
    }

    /// Awaits `work` under this call's deadline and cancellation.
    ///
    /// # Errors
    ///
    /// Same as [`Emitter::emit`].
    pub async fn watch<F: Future>(&self, work: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            () = self.tx.closed() => Err(Error::cancelled("Client closed the response stream")),
            res = run_until(self.deadline, &self.cancel, work) => res,
        }
    }

    /// Non-blocking abort check for iteration boundaries.
    ///
    /// # Errors
    ///
    /// Same as [`Emitter::emit`].
    pub fn check(&self) -> Result<()> {
        if self.tx.is_closed() {
            return Err(Error::cancelled("Client closed the response stream"));
        }
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled("Service is shutting down"));
        }
        match self.deadline {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }
}

/// Spawns `produce` on its own task and returns the stream it writes to.
///
/// The [`CallGuard`] lives as long as the producer, so the call counts as
/// in flight until the last message has been handed to the transport.
pub fn spawn_producer<T, F, Fut>(
    guard: CallGuard,
    buffer: usize,
    deadline: Option<Deadline>,
    produce: F,
) -> ReceiverStream<core::result::Result<T, Status>>
where
    T: Send + 'static,
    F: FnOnce(Emitter<T>) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer);
    let method = guard.method();
    let emitter = Emitter {
        tx: tx.clone(),
        deadline,
        cancel: guard.token().clone(),
        method,
    };
    let work = produce(emitter);

    let fut = async move {
        let _guard = guard;
        match work.await {
            Ok(()) => tracing::debug!("Stream completed"),
            Err(e) => {
                increment_call_errors(method);
                if e.is_abort() {
                    tracing::debug!(error = %e, "Stream aborted");
                } else {
                    tracing::warn!(error = %e, "Stream failed");
                }
                deliver_final(&tx, e.into()).await;
            }
        }
    };

    tokio::spawn(fut.instrument(tracing::info_span!("producer", method)));
    ReceiverStream::new(rx)
}

/// Hands the terminal status to the transport without outliving the call.
///
/// A client that holds the stream open but stops reading leaves the buffer
/// full, so the status waits at most [`FINAL_STATUS_GRACE`] for room. The
/// call's deadline and cancel token may already have fired by now and are
/// not consulted.
async fn deliver_final<T>(tx: &mpsc::Sender<core::result::Result<T, Status>>, status: Status) {
    let item = match tx.try_send(Err(status)) {
        Ok(()) => return,
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Client disconnected before the error could be delivered");
            return;
        }
        Err(TrySendError::Full(item)) => item,
    };
    match tokio::time::timeout(FINAL_STATUS_GRACE, tx.send(item)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::debug!("Client disconnected before the error could be delivered"),
        Err(_) => tracing::debug!("Client stopped reading; dropping the final status"),
    }
}
