use courier_core::{Deadline, Error, Result, deadline::run_until};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Folds a client stream into one aggregate.
///
/// Messages are applied in arrival order. The fold finishes when the client
/// half-closes its stream and returns the aggregate together with the number
/// of messages seen, so callers can decide what an empty stream means.
///
/// # Errors
///
/// - Whatever `step` returns for a message it rejects.
/// - The classified status if the inbound stream fails.
/// - [`Error::DeadlineExceeded`] or [`Error::Cancelled`] if the call is
///   aborted while waiting for the next message.
pub async fn fold_inbound<S, T, A, F>(
    inbound: S,
    deadline: Option<Deadline>,
    cancel: &CancellationToken,
    init: A,
    mut step: F,
) -> Result<(A, usize)>
where
    S: Stream<Item = core::result::Result<T, Status>>,
    F: FnMut(A, T) -> Result<A>,
{
    let mut inbound = core::pin::pin!(inbound);
    let mut acc = init;
    let mut seen = 0;

    loop {
        match run_until(deadline, cancel, inbound.next()).await? {
            Some(Ok(message)) => {
                acc = step(acc, message)?;
                seen += 1;
            }
            Some(Err(status)) => return Err(Error::from(status)),
            None => return Ok((acc, seen)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tonic::Code;

    #[tokio::test]
    async fn folds_in_order() {
        let inbound = futures::stream::iter(["a", "b", "c"].map(Ok));
        let (joined, seen) = fold_inbound(
            inbound,
            None,
            &CancellationToken::new(),
            String::new(),
            |mut acc, s| {
                acc.push_str(s);
                Ok(acc)
            },
        )
        .await
        .unwrap();
        assert_eq!(joined, "abc");
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn empty_stream_reports_zero_seen() {
        let inbound = futures::stream::empty::<core::result::Result<i64, Status>>();
        let (sum, seen) = fold_inbound(inbound, None, &CancellationToken::new(), 0, |a, n| {
            Ok(a + n)
        })
        .await
        .unwrap();
        assert_eq!((sum, seen), (0, 0));
    }

    #[tokio::test]
    async fn inbound_status_is_classified() {
        let inbound = futures::stream::iter(vec![Ok(1), Err(Status::cancelled("client left"))]);
        let err = fold_inbound(inbound, None, &CancellationToken::new(), 0, |a, n: i64| {
            Ok(a + n)
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn step_errors_stop_the_fold() {
        let inbound = futures::stream::iter([Ok(1), Ok(-1), Ok(2)]);
        let err = fold_inbound(inbound, None, &CancellationToken::new(), 0, |a, n: i64| {
            if n < 0 {
                return Err(Error::invalid_argument("negative"));
            }
            Ok(a + n)
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_hits_the_deadline() {
        let inbound = futures::stream::pending::<core::result::Result<i64, Status>>();
        let deadline = Deadline::after(Duration::from_millis(100));
        let err = fold_inbound(inbound, Some(deadline), &CancellationToken::new(), 0, |a, n| {
            Ok(a + n)
        })
        .await
        .unwrap_err();
        assert_eq!(err, Error::DeadlineExceeded);
    }
}
