//! Absolute call deadlines.
//!
//! A [`Deadline`] is fixed when a call is created and never moves. Clients
//! put the remaining budget on the wire as the standard `grpc-timeout` header
//! ([`Deadline::apply`]); servers rebuild the absolute expiry from that header
//! when the request arrives ([`Deadline::from_metadata`]).
//!
//! Long-running work never polls the clock in a sleep loop. It races the
//! work itself against the expiry and a cancellation token in one
//! [`run_until`] call, and the work wins a tie: a call that has already
//! produced its result is never cancelled after the fact.

use crate::{Error, Result};
use core::future::Future;
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::{Request, metadata::MetadataMap};

/// Header carrying the caller's remaining time budget.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// gRPC caps the timeout value at eight ASCII digits.
const MAX_TIMEOUT_DIGITS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    #[must_use]
    pub const fn at(expires_at: Instant) -> Self {
        Self { expires_at }
    }

    /// A deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Non-blocking check for use at iteration boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves when the deadline passes.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.expires_at).await;
    }

    /// Encodes the remaining budget into the request's `grpc-timeout` header.
    pub fn apply<T>(&self, request: &mut Request<T>) {
        request.set_timeout(self.remaining());
    }

    /// Rebuilds a deadline from an incoming request's `grpc-timeout` header.
    ///
    /// Returns `None` when the header is absent or malformed; such calls run
    /// without a deadline.
    #[must_use]
    pub fn from_metadata(metadata: &MetadataMap) -> Option<Self> {
        let raw = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
        parse_grpc_timeout(raw).map(Self::after)
    }

    /// The earlier of two optional deadlines.
    #[must_use]
    pub fn earliest(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Parses a `grpc-timeout` value: up to eight digits followed by one of
/// `H`, `M`, `S`, `m`, `u`, `n`.
#[must_use]
pub fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    if !raw.is_ascii() {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len().checked_sub(1)?);
    if digits.is_empty() || digits.len() > MAX_TIMEOUT_DIGITS {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(value.checked_mul(3600)?),
        "M" => Duration::from_secs(value.checked_mul(60)?),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return None,
    };
    Some(duration)
}

/// Resolves when `deadline` passes, or never when there is none.
pub async fn expiry(deadline: Option<Deadline>) {
    match deadline {
        Some(deadline) => deadline.expired().await,
        None => core::future::pending().await,
    }
}

/// Drives `work` to completion unless the deadline passes or `cancel` fires
/// first.
///
/// # Errors
///
/// - [`Error::Cancelled`] if `cancel` fires before `work` completes.
/// - [`Error::DeadlineExceeded`] if the deadline passes before `work`
///   completes.
pub async fn run_until<F>(
    deadline: Option<Deadline>,
    cancel: &CancellationToken,
    work: F,
) -> Result<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        output = work => Ok(output),
        () = cancel.cancelled() => Err(Error::cancelled("Call was cancelled before it completed")),
        () = expiry(deadline) => Err(Error::DeadlineExceeded),
    }
}
