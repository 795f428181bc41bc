//! Bidirectional calls.
//!
//! One task reads the inbound stream, feeds each message to a step function,
//! and emits whatever the step returns. The response stream ends after the
//! client half-closes and every reply has been emitted, so the server never
//! finishes a call before it has answered every message it read.

use super::producer::spawn_producer;
use crate::server::lifecycle::CallGuard;
use courier_core::{Deadline, Error, Result};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Spawns the task serving a bidirectional call.
///
/// `step` sees messages in arrival order and returns `Ok(None)` for messages
/// that produce no reply. An error from `step` ends the call with that
/// error.
pub fn spawn_duplex<S, In, Out, F>(
    guard: CallGuard,
    buffer: usize,
    deadline: Option<Deadline>,
    inbound: S,
    mut step: F,
) -> ReceiverStream<core::result::Result<Out, Status>>
where
    S: Stream<Item = core::result::Result<In, Status>> + Send + 'static,
    In: Send + 'static,
    Out: Send + 'static,
    F: FnMut(In) -> Result<Option<Out>> + Send + 'static,
{
    spawn_producer(guard, buffer, deadline, move |emitter| async move {
        let mut inbound = core::pin::pin!(inbound);
        while let Some(message) = emitter.watch(inbound.next()).await? {
            let message = message.map_err(Error::from)?;
            if let Some(reply) = step(message)? {
                emitter.emit(reply).await?;
            }
        }
        Ok(())
    })
}
