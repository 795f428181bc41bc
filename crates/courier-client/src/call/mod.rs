//! Per-call plumbing shared by every caller.
//!
//! A [`CallContext`] is created per call and fixes the call's deadline at
//! creation. It writes that deadline onto outgoing requests and races every
//! wait of the call against it and against the context's cancellation
//! token.

pub mod channel;
pub mod client_stream;
pub mod duplex;
pub mod server_stream;
pub mod unary;

use core::{future::Future, time::Duration};
use courier_core::{Deadline, Error, Result, deadline::run_until};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Status};

#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Deadline>,
    cancel: CancellationToken,
}

impl CallContext {
    /// A context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Deadline::after(timeout))
    }

    #[must_use]
    pub fn with_deadline(deadline: Deadline) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `timeout` when given, no deadline otherwise.
    #[must_use]
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::new, Self::with_timeout)
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Aborts the call. Every pending wait resolves with
    /// [`Error::Cancelled`] and the server observes the reset stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wraps `message` in a request carrying this call's remaining budget.
    pub fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(deadline) = self.deadline {
            deadline.apply(&mut request);
        }
        request
    }

    /// Awaits one step of the call, classifying its status.
    ///
    /// # Errors
    ///
    /// The classified status if `work` fails, or [`Error::DeadlineExceeded`]
    /// / [`Error::Cancelled`] if the call is aborted first.
    pub async fn guard<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = core::result::Result<T, Status>>,
    {
        run_until(self.deadline, &self.cancel, work)
            .await?
            .map_err(|status| self.classify(status))
    }

    fn classify(&self, status: Status) -> Error {
        classify(self.deadline, status)
    }

    /// Non-blocking abort check.
    ///
    /// # Errors
    ///
    /// Same as [`CallContext::guard`], without a status of its own.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled("Call was cancelled before it completed"));
        }
        self.deadline.as_ref().map_or(Ok(()), Deadline::check)
    }
}

/// The transport reports its own expired timer as `CANCELLED`; once the
/// call's deadline has passed that is a deadline failure.
pub(crate) fn classify(deadline: Option<Deadline>, status: Status) -> Error {
    match Error::from(status) {
        Error::Cancelled { .. } if deadline.is_some_and(|d| d.is_expired()) => {
            Error::DeadlineExceeded
        }
        err => err,
    }
}
