//! Status classification for every courier call.
//!
//! This module defines the central `Error` enum, the closed vocabulary every
//! failed call terminates with. Handlers never build a [`tonic::Status`] by
//! hand: they return an `Error`, and `From<Error> for Status` turns it into
//! the wire representation. Clients run the reverse mapping so callers can
//! branch on [`Error::code`] without parsing messages.
//!
//! ## Error Cases
//! - `InvalidArgument`: Malformed or out-of-domain input (negative square
//!   root, unparsable record id, empty aggregate).
//! - `NotFound`: The referenced record is absent from persistence.
//! - `Internal`: An external collaborator or internal channel failed
//!   unexpectedly.
//! - `Cancelled`: The call was aborted before completion.
//! - `DeadlineExceeded`: The call's deadline elapsed before completion.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Terminal outcome of a failed call.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request was malformed or outside the accepted numeric domain.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The referenced record does not exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// An external collaborator or internal channel failed.
    #[error("Internal error: {context}")]
    Internal { context: String },

    /// The call was aborted before it completed.
    #[error("Call cancelled: {reason}")]
    Cancelled { reason: String },

    /// The call's deadline elapsed before it completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Internal channel send/receive failure between the tasks serving a
    /// call.
    pub fn channel(context: impl core::fmt::Display) -> Self {
        Self::Internal {
            context: format!("Channel error: {context}"),
        }
    }

    /// The gRPC status code this error travels as.
    #[must_use]
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::NotFound { .. } => Code::NotFound,
            Self::Internal { .. } => Code::Internal,
            Self::Cancelled { .. } => Code::Cancelled,
            Self::DeadlineExceeded => Code::DeadlineExceeded,
        }
    }

    /// Whether the call ended because it ran out of time or was aborted,
    /// rather than because of its input or a collaborator.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::NotFound { what } => Status::not_found(what),
            Error::Internal { context } => Status::internal(context),
            Error::Cancelled { reason } => Status::cancelled(reason),
            Error::DeadlineExceeded => {
                Status::deadline_exceeded("Deadline exceeded before the call completed")
            }
        }
    }
}

/// Classifies a status received from the wire. Codes outside the courier
/// vocabulary (e.g. `Unavailable` when the transport drops) surface as
/// `Internal` with the received code kept in the context.
impl From<Status> for Error {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::InvalidArgument => Self::InvalidArgument { reason: message },
            Code::NotFound => Self::NotFound { what: message },
            Code::Cancelled => Self::Cancelled { reason: message },
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Internal => Self::Internal { context: message },
            code => Self::Internal {
                context: format!("{code:?}: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_vocabulary() {
        let cases = [
            (Error::invalid_argument("negative"), Code::InvalidArgument),
            (Error::not_found("blog 01"), Code::NotFound),
            (Error::internal("store offline"), Code::Internal),
            (Error::cancelled("client went away"), Code::Cancelled),
            (Error::DeadlineExceeded, Code::DeadlineExceeded),
        ];

        for (err, code) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn status_message_carries_reason() {
        let status = Status::from(Error::invalid_argument("Negative number received -4"));
        assert_eq!(status.message(), "Negative number received -4");
    }

    #[test]
    fn classified_status_survives_the_wire() {
        let original = Error::not_found("Blog 01J0000000000000000000000 not found");
        let back = Error::from(Status::from(original.clone()));
        assert_eq!(back, original);
    }

    #[test]
    fn foreign_codes_classify_as_internal() {
        let err = Error::from(Status::unavailable("connection refused"));
        assert_eq!(err.code(), Code::Internal);
        match err {
            Error::Internal { context } => {
                assert!(context.contains("Unavailable"));
                assert!(context.contains("connection refused"));
            }
            other => panic!("expected internal, got {other:?}"),
        }
    }

    #[test]
    fn channel_errors_are_internal() {
        let err = Error::channel("receiver dropped");
        assert_eq!(err.code(), Code::Internal);
        assert!(!err.is_abort());
        assert!(Error::DeadlineExceeded.is_abort());
    }
}
