//! Bidirectional exchange: one task per direction.
//!
//! The outbound task feeds the request stream at its own pace and never
//! waits on replies. The inbound task drains replies as they arrive and
//! reports through a oneshot when the server ends the stream. The exchange
//! completes only after both directions are terminal.
//!
//! The server decides when the call is over. A clean end of the reply stream
//! completes the exchange even if some outbound messages were never sent,
//! and [`Exchange::sent`] counts only those that were.

use super::{CallContext, classify};
use core::{future::Future, time::Duration};
use courier_core::{Deadline, Error, Result, deadline::run_until};
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

const OUTBOUND_BUFFER: usize = 16;

/// Outcome of a completed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange<T> {
    /// Messages delivered to the request stream.
    pub sent: usize,
    /// Every reply, mapped through the caller's handler, in receive order.
    pub received: Vec<T>,
}

/// Runs a bidirectional call to completion.
///
/// `outbound` is sent in order, sleeping `pace` between messages; the send
/// side half-closes after the last one. `on_reply` handles each reply as it
/// arrives, independently of the send side.
///
/// # Errors
///
/// The server's failure status, or the context's abort error. A failure in
/// either direction stops the other.
pub async fn exchange<Req, Resp, Out, I, F, Fut, S, H>(
    ctx: &CallContext,
    outbound: I,
    pace: Duration,
    call: F,
    on_reply: H,
) -> Result<Exchange<Out>>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    Out: Send + 'static,
    I: IntoIterator<Item = Req>,
    I::IntoIter: Send + 'static,
    F: FnOnce(Request<ReceiverStream<Req>>) -> Fut,
    Fut: Future<Output = core::result::Result<Response<S>, Status>>,
    S: Stream<Item = core::result::Result<Resp, Status>> + Send + Unpin + 'static,
    H: FnMut(Resp) -> Out + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    // Stops both directions once either fails; the caller's own token still
    // cancels through it.
    let halt = ctx.cancel_token().child_token();
    // Both tasks outlive this future unless told otherwise, so a caller that
    // drops the exchange must stop them too.
    let _halt_on_drop = halt.clone().drop_guard();

    let sender = tokio::spawn(pump_outbound(
        outbound.into_iter(),
        tx,
        pace,
        ctx.deadline(),
        halt.clone(),
    ));

    let inbound = match ctx.guard(call(ctx.request(ReceiverStream::new(rx)))).await {
        Ok(response) => response.into_inner(),
        Err(e) => {
            halt.cancel();
            sender.abort();
            return Err(e);
        }
    };

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn({
        let halt = halt.clone();
        let deadline = ctx.deadline();
        async move {
            let outcome = drain_inbound(inbound, deadline, &halt, on_reply).await;
            // The receiver only goes away if the exchange itself was dropped.
            let _ = done_tx.send(outcome);
        }
    });

    let outcome = done_rx.await;
    // The server has ended the call either way. Anything still queued on the
    // send side can no longer be delivered.
    halt.cancel();
    let received = match outcome {
        Ok(Ok(received)) => received,
        Ok(Err(e)) => {
            let _ = sender.await;
            return Err(e);
        }
        Err(e) => return Err(Error::channel(e)),
    };

    let sent = sender
        .await
        .map_err(|e| Error::internal(format!("Outbound task failed: {e}")))?;
    tracing::debug!(sent, received = received.len(), "Exchange complete");

    Ok(Exchange { sent, received })
}

/// Feeds the request stream and returns how many messages it accepted.
///
/// Stopping early is not an error of its own: the deadline, a cancel, or a
/// closed request stream all end the call, and the inbound side reports how.
async fn pump_outbound<Req, I>(
    outbound: I,
    tx: mpsc::Sender<Req>,
    pace: Duration,
    deadline: Option<Deadline>,
    halt: CancellationToken,
) -> usize
where
    I: Iterator<Item = Req>,
{
    let mut sent = 0;
    if let Err(e) = send_all(outbound, &tx, pace, deadline, &halt, &mut sent).await {
        tracing::debug!(error = %e, sent, "Send side stopped early");
    }
    // Dropping `tx` here half-closes the request stream.
    sent
}

async fn send_all<Req, I>(
    outbound: I,
    tx: &mpsc::Sender<Req>,
    pace: Duration,
    deadline: Option<Deadline>,
    halt: &CancellationToken,
    sent: &mut usize,
) -> Result<()>
where
    I: Iterator<Item = Req>,
{
    for message in outbound {
        if *sent > 0 && !pace.is_zero() {
            run_until(deadline, halt, tokio::time::sleep(pace)).await?;
        }
        run_until(deadline, halt, tx.send(message))
            .await?
            .map_err(|_| Error::cancelled("Request stream closed before every message was sent"))?;
        *sent += 1;
    }
    Ok(())
}

async fn drain_inbound<Resp, Out, S, H>(
    mut inbound: S,
    deadline: Option<Deadline>,
    halt: &CancellationToken,
    mut on_reply: H,
) -> Result<Vec<Out>>
where
    S: Stream<Item = core::result::Result<Resp, Status>> + Unpin,
    H: FnMut(Resp) -> Out,
{
    let mut received = Vec::new();
    while let Some(reply) = run_until(deadline, halt, inbound.next()).await? {
        let reply = reply.map_err(|status| classify(deadline, status))?;
        received.push(on_reply(reply));
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    /// Echoes each number doubled, like a server replying per message.
    fn doubling(
        req: Request<ReceiverStream<i64>>,
    ) -> impl Future<
        Output = core::result::Result<
            Response<impl Stream<Item = core::result::Result<i64, Status>> + Send + Unpin>,
            Status,
        >,
    > {
        async move {
            let replies = req.into_inner().map(|n| Ok(n * 2));
            Ok(Response::new(replies))
        }
    }

    #[tokio::test]
    async fn replies_arrive_in_order() {
        let ctx = CallContext::new();
        let outcome = exchange(&ctx, vec![1, 2, 3], Duration::ZERO, doubling, |n| n)
            .await
            .unwrap();
        assert_eq!(outcome.sent, 3);
        assert_eq!(outcome.received, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn empty_exchange_completes() {
        let ctx = CallContext::new();
        let outcome = exchange(&ctx, Vec::<i64>::new(), Duration::ZERO, doubling, |n| n)
            .await
            .unwrap();
        assert_eq!(outcome, Exchange {
            sent: 0,
            received: vec![],
        });
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_is_paced() {
        let ctx = CallContext::new();
        let start = Instant::now();
        let outcome = exchange(&ctx, vec![1, 2, 3], Duration::from_secs(1), doubling, |n| n)
            .await
            .unwrap();
        assert_eq!(outcome.received.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn server_failure_stops_both_directions() {
        let ctx = CallContext::new();
        let err = exchange(
            &ctx,
            0..1_000_i64,
            Duration::ZERO,
            |req: Request<ReceiverStream<i64>>| async move {
                let replies = req.into_inner().map(|n| {
                    if n == 3 {
                        Err(Status::invalid_argument("three is not allowed"))
                    } else {
                        Ok(n)
                    }
                });
                Ok(Response::new(replies))
            },
            |n| n,
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::invalid_argument("three is not allowed"));
    }

    #[tokio::test]
    async fn server_may_finish_before_the_client() {
        let ctx = CallContext::new();
        let outcome = exchange(
            &ctx,
            0..1_000_i64,
            Duration::ZERO,
            |req: Request<ReceiverStream<i64>>| async move {
                Ok(Response::new(req.into_inner().take(2).map(Ok::<i64, Status>)))
            },
            |n| n,
        )
        .await
        .unwrap();
        assert_eq!(outcome.received, vec![0, 1]);
        assert!(outcome.sent >= 2);
        assert!(outcome.sent < 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_exchange_stops_the_send_side() {
        let ctx = CallContext::new();
        let (closed_tx, closed_rx) = oneshot::channel();
        let pending = exchange(
            &ctx,
            0_i64..,
            Duration::from_millis(10),
            move |req: Request<ReceiverStream<i64>>| async move {
                let mut requests = req.into_inner();
                tokio::spawn(async move {
                    while requests.next().await.is_some() {}
                    let _ = closed_tx.send(());
                });
                Ok(Response::new(
                    futures::stream::pending::<core::result::Result<i64, Status>>(),
                ))
            },
            |n| n,
        );

        assert!(
            tokio::time::timeout(Duration::from_millis(100), pending)
                .await
                .is_err()
        );
        // The request stream only ends once the outbound task lets go of it.
        closed_rx.await.unwrap();
    }

    #[tokio::test]
    async fn refused_call_is_reported() {
        let ctx = CallContext::new();
        let err = exchange(
            &ctx,
            vec![1_i64],
            Duration::ZERO,
            |_req: Request<ReceiverStream<i64>>| async {
                Err::<Response<futures::stream::Empty<core::result::Result<i64, Status>>>, _>(
                    Status::internal("store offline"),
                )
            },
            |n| n,
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::internal("store offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_a_silent_exchange() {
        let ctx = CallContext::with_timeout(Duration::from_millis(200));
        let err = exchange(
            &ctx,
            vec![1_i64, 2],
            Duration::ZERO,
            |_req: Request<ReceiverStream<i64>>| async {
                Ok(Response::new(
                    futures::stream::pending::<core::result::Result<i64, Status>>(),
                ))
            },
            |n| n,
        )
        .await
        .unwrap_err();
        assert_eq!(err, Error::DeadlineExceeded);
    }
}
