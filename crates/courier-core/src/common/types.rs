//! # Shared Record Types
//!
//! Persisted records are addressed by a [`RecordId`]: a 128-bit [`ULID`]
//! generated on insert and rendered as its 26-character Crockford Base32
//! string. Client and server agree on this encoding at compile time, so an id
//! that fails to decode is always the caller's mistake and classifies as
//! [`Error::InvalidArgument`], never as a missing record.

use crate::{Error, Result};
use core::{fmt, str::FromStr};
use ferroid::{base32::Base32UlidExt, id::ULID};

/// Identifier assigned to a record when it is first stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(ULID);

impl RecordId {
    /// Generates a fresh, time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(ULID::from_datetime(std::time::SystemTime::now()))
    }

    /// Decodes the Crockford Base32 form produced by [`RecordId`]'s `Display`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `raw` is not a valid encoded
    /// ULID.
    pub fn parse(raw: &str) -> Result<Self> {
        ULID::decode(raw).map(Self).map_err(|e| {
            Error::invalid_argument(format!("Unable to parse record id {raw:?}: {e}"))
        })
    }

    #[must_use]
    pub const fn ulid(&self) -> ULID {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.encode())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
